//! Five-field cron expressions evaluated in wall-clock time.
//!
//! ```text
//! ┌───────────── minute (0-59)
//! │ ┌───────────── hour (0-23)
//! │ │ ┌───────────── day of month (1-31)
//! │ │ │ ┌───────────── month (1-12)
//! │ │ │ │ ┌───────────── day of week (0-7, 0 and 7 = Sunday)
//! │ │ │ │ │
//! * * * * *
//! ```
//!
//! Each field accepts a literal, `*`, a range `a-b`, a comma-separated list,
//! or a step (`*/n`, `a-b/n`, `a/n`). Day-of-month and day-of-week follow
//! the traditional cron rule: when both are restricted a day matches if it
//! satisfies either; when one of them starts with `*` only the other one
//! decides.

use chrono::{
    DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of days scanned before a schedule is declared unsatisfiable.
///
/// Eight years covers the longest gap between two February 29ths.
const MAX_SEARCH_DAYS: u32 = 8 * 366 + 1;

/// Longest daylight-saving gap walked when a wall-clock time does not exist.
const MAX_GAP_MINUTES: u32 = 24 * 60;

/// Errors raised while parsing a cron expression.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CronError {
    /// The expression is empty or whitespace only.
    #[error("cron expression must not be empty")]
    Empty,

    /// The expression does not contain exactly five fields.
    #[error("cron expression must have 5 fields, found {0}")]
    FieldCount(usize),

    /// A field element is not a number, `*`, range, list or step.
    #[error("invalid {field} value '{value}'")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Offending text.
        value: String,
    },

    /// A value lies outside the field's permitted bounds.
    #[error("{field} value {value} is outside {min}-{max}")]
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: u32,
        /// Inclusive lower bound.
        min: u32,
        /// Inclusive upper bound.
        max: u32,
    },

    /// A range whose start exceeds its end.
    #[error("invalid {field} range {start}-{end}")]
    InvalidRange {
        /// Field name.
        field: &'static str,
        /// Range start.
        start: u32,
        /// Range end.
        end: u32,
    },

    /// A step that is not a positive integer.
    #[error("invalid {field} step '{step}'")]
    InvalidStep {
        /// Field name.
        field: &'static str,
        /// Offending step text.
        step: String,
    },
}

#[derive(Debug, Clone, Copy)]
struct FieldBounds {
    name: &'static str,
    min: u32,
    max: u32,
}

const MINUTE: FieldBounds = FieldBounds {
    name: "minute",
    min: 0,
    max: 59,
};
const HOUR: FieldBounds = FieldBounds {
    name: "hour",
    min: 0,
    max: 23,
};
const DAY_OF_MONTH: FieldBounds = FieldBounds {
    name: "day-of-month",
    min: 1,
    max: 31,
};
const MONTH: FieldBounds = FieldBounds {
    name: "month",
    min: 1,
    max: 12,
};
const DAY_OF_WEEK: FieldBounds = FieldBounds {
    name: "day-of-week",
    min: 0,
    max: 7,
};

/// One parsed cron field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronField {
    values: BTreeSet<u32>,
    restricted: bool,
}

impl CronField {
    fn parse(expr: &str, bounds: FieldBounds) -> Result<Self, CronError> {
        let mut values = BTreeSet::new();
        for part in expr.split(',') {
            parse_part(part, bounds, &mut values)?;
        }
        Ok(Self {
            values,
            restricted: !expr.starts_with('*'),
        })
    }

    /// Returns whether `value` is selected by this field.
    #[must_use]
    pub fn matches(&self, value: u32) -> bool {
        self.values.contains(&value)
    }

    /// Returns `false` when the field was written starting with `*`.
    #[must_use]
    pub const fn is_restricted(&self) -> bool {
        self.restricted
    }

    /// Iterates the selected values in ascending order.
    pub fn values(&self) -> impl Iterator<Item = u32> + '_ {
        self.values.iter().copied()
    }
}

fn parse_part(part: &str, bounds: FieldBounds, values: &mut BTreeSet<u32>) -> Result<(), CronError> {
    let (range_part, step) = match part.split_once('/') {
        Some((range_part, step_text)) => (range_part, Some(parse_step(step_text, bounds)?)),
        None => (part, None),
    };

    let (start, end) = if range_part == "*" {
        (bounds.min, bounds.max)
    } else if let Some((start_text, end_text)) = range_part.split_once('-') {
        let start = parse_value(start_text, bounds)?;
        let end = parse_value(end_text, bounds)?;
        if start > end {
            return Err(CronError::InvalidRange {
                field: bounds.name,
                start,
                end,
            });
        }
        (start, end)
    } else {
        let value = parse_value(range_part, bounds)?;
        // `a/n` runs from `a` to the end of the field.
        if step.is_some() {
            (value, bounds.max)
        } else {
            (value, value)
        }
    };

    let stride = step.unwrap_or(1);
    for value in (start..=end).step_by(stride) {
        values.insert(fold_value(value, bounds));
    }
    Ok(())
}

fn parse_value(text: &str, bounds: FieldBounds) -> Result<u32, CronError> {
    if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(CronError::InvalidValue {
            field: bounds.name,
            value: text.to_owned(),
        });
    }
    let value = text.parse::<u32>().map_err(|_| CronError::InvalidValue {
        field: bounds.name,
        value: text.to_owned(),
    })?;
    if value < bounds.min || value > bounds.max {
        return Err(CronError::OutOfRange {
            field: bounds.name,
            value,
            min: bounds.min,
            max: bounds.max,
        });
    }
    Ok(value)
}

fn parse_step(text: &str, bounds: FieldBounds) -> Result<usize, CronError> {
    let invalid = || CronError::InvalidStep {
        field: bounds.name,
        step: text.to_owned(),
    };
    if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid());
    }
    match text.parse::<usize>() {
        Ok(step) if step > 0 => Ok(step),
        _ => Err(invalid()),
    }
}

/// Sunday may be written as 7.
const fn fold_value(value: u32, bounds: FieldBounds) -> u32 {
    if bounds.max == DAY_OF_WEEK.max && bounds.min == DAY_OF_WEEK.min && value == 7 {
        0
    } else {
        value
    }
}

/// A validated five-field cron expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CronSpec {
    expression: String,
    minute: CronField,
    hour: CronField,
    day_of_month: CronField,
    month: CronField,
    day_of_week: CronField,
}

impl CronSpec {
    /// Parses a cron expression.
    ///
    /// Fields may be separated by any run of whitespace; the stored
    /// expression joins them with single spaces.
    ///
    /// # Errors
    ///
    /// Returns [`CronError`] when the expression is empty, does not have
    /// exactly five fields, or any field is malformed.
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let [minute, hour, day_of_month, month, day_of_week] = fields.as_slice() else {
            if fields.is_empty() {
                return Err(CronError::Empty);
            }
            return Err(CronError::FieldCount(fields.len()));
        };

        Ok(Self {
            expression: fields.join(" "),
            minute: CronField::parse(minute, MINUTE)?,
            hour: CronField::parse(hour, HOUR)?,
            day_of_month: CronField::parse(day_of_month, DAY_OF_MONTH)?,
            month: CronField::parse(month, MONTH)?,
            day_of_week: CronField::parse(day_of_week, DAY_OF_WEEK)?,
        })
    }

    /// Returns whether `expr` parses; accepts exactly what [`Self::parse`]
    /// accepts.
    #[must_use]
    pub fn validate(expr: &str) -> bool {
        Self::parse(expr).is_ok()
    }

    /// Returns the normalized expression text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.expression
    }

    /// Returns the minute field.
    #[must_use]
    pub const fn minute(&self) -> &CronField {
        &self.minute
    }

    /// Returns the hour field.
    #[must_use]
    pub const fn hour(&self) -> &CronField {
        &self.hour
    }

    /// Returns the day-of-month field.
    #[must_use]
    pub const fn day_of_month(&self) -> &CronField {
        &self.day_of_month
    }

    /// Returns the month field.
    #[must_use]
    pub const fn month(&self) -> &CronField {
        &self.month
    }

    /// Returns the day-of-week field.
    #[must_use]
    pub const fn day_of_week(&self) -> &CronField {
        &self.day_of_week
    }

    /// Returns whether the calendar date satisfies the month and day rules.
    #[must_use]
    pub fn matches_date(&self, date: NaiveDate) -> bool {
        if !self.month.matches(date.month()) {
            return false;
        }
        let dom = self.day_of_month.matches(date.day());
        let dow = self
            .day_of_week
            .matches(date.weekday().num_days_from_sunday());
        match (
            self.day_of_month.is_restricted(),
            self.day_of_week.is_restricted(),
        ) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    /// Computes the smallest instant strictly after `after` whose wall-clock
    /// time in `time_zone` satisfies every field.
    ///
    /// A wall-clock time skipped by a daylight-saving transition fires at
    /// the first representable instant after the gap; a repeated wall-clock
    /// time fires at its earlier occurrence. Returns `None` when no date in
    /// the next eight years matches (for example `0 0 30 2 *`).
    #[must_use]
    pub fn next_fire_after(&self, time_zone: Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut date = after.with_timezone(&time_zone).date_naive();
        for _ in 0..MAX_SEARCH_DAYS {
            if self.matches_date(date)
                && let Some(found) = self.first_fire_on(date, time_zone, after)
            {
                return Some(found);
            }
            date = date.succ_opt()?;
        }
        None
    }

    fn first_fire_on(&self, date: NaiveDate, time_zone: Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        for hour in self.hour.values() {
            for minute in self.minute.values() {
                let Some(wall_clock) = date.and_hms_opt(hour, minute, 0) else {
                    continue;
                };
                let Some(instant) = resolve_wall_clock(time_zone, wall_clock) else {
                    continue;
                };
                if instant > after {
                    return Some(instant);
                }
            }
        }
        None
    }
}

/// Maps a wall-clock time to an instant, shifting times inside a DST gap to
/// the end of the gap and choosing the earlier of two repeated times.
fn resolve_wall_clock(time_zone: Tz, wall_clock: NaiveDateTime) -> Option<DateTime<Utc>> {
    match time_zone.from_local_datetime(&wall_clock) {
        LocalResult::Single(instant) => Some(instant.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            let mut probe = wall_clock;
            for _ in 0..MAX_GAP_MINUTES {
                probe = probe.checked_add_signed(TimeDelta::minutes(1))?;
                if let Some(instant) = time_zone.from_local_datetime(&probe).earliest() {
                    return Some(instant.with_timezone(&Utc));
                }
            }
            None
        }
    }
}

impl FromStr for CronSpec {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CronSpec {
    type Error = CronError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CronSpec> for String {
    fn from(value: CronSpec) -> Self {
        value.expression
    }
}

impl fmt::Display for CronSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}
