//! Cron schedule bound to an IANA timezone.

use super::{BackupDomainError, CronSpec};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated IANA timezone identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeZoneName(Tz);

impl TimeZoneName {
    /// Resolves a timezone identifier such as `Europe/Berlin` or `UTC`.
    ///
    /// # Errors
    ///
    /// Returns [`BackupDomainError::UnknownTimeZone`] when the identifier is
    /// not in the timezone database.
    pub fn new(value: &str) -> Result<Self, BackupDomainError> {
        value
            .trim()
            .parse::<Tz>()
            .map(Self)
            .map_err(|_| BackupDomainError::UnknownTimeZone(value.to_owned()))
    }

    /// Returns the canonical identifier.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        self.0.name()
    }

    /// Returns the underlying zone.
    #[must_use]
    pub const fn tz(self) -> Tz {
        self.0
    }
}

impl TryFrom<String> for TimeZoneName {
    type Error = BackupDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<TimeZoneName> for String {
    fn from(value: TimeZoneName) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for TimeZoneName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a definition fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    cron: CronSpec,
    time_zone: TimeZoneName,
}

impl Schedule {
    /// Combines a cron expression with the zone it is evaluated in.
    #[must_use]
    pub const fn new(cron: CronSpec, time_zone: TimeZoneName) -> Self {
        Self { cron, time_zone }
    }

    /// Returns the cron expression.
    #[must_use]
    pub const fn cron(&self) -> &CronSpec {
        &self.cron
    }

    /// Returns the evaluation timezone.
    #[must_use]
    pub const fn time_zone(&self) -> TimeZoneName {
        self.time_zone
    }

    /// Next fire instant strictly after `after`, or `None` if the
    /// expression can never be satisfied.
    #[must_use]
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cron.next_fire_after(self.time_zone.tz(), after)
    }
}
