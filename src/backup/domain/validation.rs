//! Normalization of raw form submissions into definition settings.
//!
//! Every field is checked independently so a submission surfaces all of its
//! problems at once. Within one field the first structural failure (missing
//! value, malformed UUID, malformed boolean) stops further checks for that
//! field only.

use super::{
    BackupDomainError, CronSpec, DatabaseId, DefinitionSettings, DestinationDir, DestinationId,
    DestinationMode, DumpOptions, RetentionDays, Schedule, TimeZoneName,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Raw field values as collected by the transport layer.
///
/// Booleans arrive as the strings `"true"` and `"false"`; absent fields are
/// `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDefinitionFields {
    /// Database UUID.
    pub database_id: Option<String>,
    /// Remote destination UUID; required when `is_local` is `"false"`.
    pub destination_id: Option<String>,
    /// `"true"` for local backups.
    pub is_local: Option<String>,
    /// Definition name.
    pub name: Option<String>,
    /// Five-field cron expression.
    pub cron_expression: Option<String>,
    /// IANA timezone identifier.
    pub time_zone: Option<String>,
    /// `"true"` to schedule the definition.
    pub is_active: Option<String>,
    /// Destination directory such as `/nightly`.
    pub dest_dir: Option<String>,
    /// Retention window in days.
    pub retention_days: Option<i64>,
    /// `--data-only` switch.
    pub opt_data_only: Option<String>,
    /// `--schema-only` switch.
    pub opt_schema_only: Option<String>,
    /// `--clean` switch.
    pub opt_clean: Option<String>,
    /// `--if-exists` switch.
    pub opt_if_exists: Option<String>,
    /// `--create` switch.
    pub opt_create: Option<String>,
    /// `--no-comments` switch.
    pub opt_no_comments: Option<String>,
}

impl From<&DefinitionSettings> for RawDefinitionFields {
    fn from(settings: &DefinitionSettings) -> Self {
        let flag = |value: bool| Some(value.to_string());
        Self {
            database_id: Some(settings.database_id.to_string()),
            destination_id: settings.destination.destination_id().map(|id| id.to_string()),
            is_local: flag(settings.destination.is_local()),
            name: Some(settings.name.clone()),
            cron_expression: Some(settings.schedule.cron().as_str().to_owned()),
            time_zone: Some(settings.schedule.time_zone().as_str().to_owned()),
            is_active: flag(settings.is_active),
            dest_dir: Some(settings.dest_dir.as_str().to_owned()),
            retention_days: Some(i64::from(settings.retention)),
            opt_data_only: flag(settings.options.data_only),
            opt_schema_only: flag(settings.options.schema_only),
            opt_clean: flag(settings.options.clean),
            opt_if_exists: flag(settings.options.if_exists),
            opt_create: flag(settings.options.create),
            opt_no_comments: flag(settings.options.no_comments),
        }
    }
}

/// Names of the submitted fields, matching the form contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    /// `database_id`
    DatabaseId,
    /// `destination_id`
    DestinationId,
    /// `is_local`
    IsLocal,
    /// `name`
    Name,
    /// `cron_expression`
    CronExpression,
    /// `time_zone`
    TimeZone,
    /// `is_active`
    IsActive,
    /// `dest_dir`
    DestDir,
    /// `retention_days`
    RetentionDays,
    /// `opt_data_only`
    OptDataOnly,
    /// `opt_schema_only`
    OptSchemaOnly,
    /// `opt_clean`
    OptClean,
    /// `opt_if_exists`
    OptIfExists,
    /// `opt_create`
    OptCreate,
    /// `opt_no_comments`
    OptNoComments,
}

impl FieldName {
    /// Returns the form key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DatabaseId => "database_id",
            Self::DestinationId => "destination_id",
            Self::IsLocal => "is_local",
            Self::Name => "name",
            Self::CronExpression => "cron_expression",
            Self::TimeZone => "time_zone",
            Self::IsActive => "is_active",
            Self::DestDir => "dest_dir",
            Self::RetentionDays => "retention_days",
            Self::OptDataOnly => "opt_data_only",
            Self::OptSchemaOnly => "opt_schema_only",
            Self::OptClean => "opt_clean",
            Self::OptIfExists => "opt_if_exists",
            Self::OptCreate => "opt_create",
            Self::OptNoComments => "opt_no_comments",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is wrong with one field.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FieldProblem {
    /// The field is absent or blank.
    #[error("is required")]
    Missing,
    /// The field is not a UUID.
    #[error("must be a valid UUID")]
    InvalidUuid,
    /// The field is not exactly `"true"` or `"false"`.
    #[error("must be \"true\" or \"false\"")]
    InvalidBoolean,
    /// The value breaks a domain invariant.
    #[error(transparent)]
    Domain(#[from] BackupDomainError),
}

/// A rejected field and the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Offending field.
    pub field: FieldName,
    /// Problem found.
    pub problem: FieldProblem,
}

impl FieldError {
    /// Human-readable reason.
    #[must_use]
    pub fn reason(&self) -> String {
        self.problem.to_string()
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

/// A submission rejected field by field. Nothing was persisted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("validation failed: {}", summarize(.errors))]
pub struct ValidationFailed {
    errors: Vec<FieldError>,
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationFailed {
    /// Wraps a single field error.
    #[must_use]
    pub fn single(field: FieldName, problem: impl Into<FieldProblem>) -> Self {
        Self {
            errors: vec![FieldError {
                field,
                problem: problem.into(),
            }],
        }
    }

    /// Returns every field error in submission order.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns the problem reported for `field`, if any.
    #[must_use]
    pub fn problem_for(&self, field: FieldName) -> Option<&FieldProblem> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| &error.problem)
    }
}

#[derive(Default)]
struct Collector {
    errors: Vec<FieldError>,
}

impl Collector {
    fn reject(&mut self, field: FieldName, problem: impl Into<FieldProblem>) {
        self.errors.push(FieldError {
            field,
            problem: problem.into(),
        });
    }

    fn required<'a>(&mut self, field: FieldName, value: Option<&'a str>) -> Option<&'a str> {
        match value {
            Some(text) if !text.trim().is_empty() => Some(text),
            _ => {
                self.reject(field, FieldProblem::Missing);
                None
            }
        }
    }

    fn uuid(&mut self, field: FieldName, value: Option<&str>) -> Option<Uuid> {
        let text = self.required(field, value)?;
        Uuid::parse_str(text.trim())
            .inspect_err(|_| self.reject(field, FieldProblem::InvalidUuid))
            .ok()
    }

    fn boolean(&mut self, field: FieldName, value: Option<&str>) -> Option<bool> {
        match self.required(field, value)? {
            "true" => Some(true),
            "false" => Some(false),
            _ => {
                self.reject(field, FieldProblem::InvalidBoolean);
                None
            }
        }
    }

    fn domain<T>(&mut self, field: FieldName, result: Result<T, BackupDomainError>) -> Option<T> {
        result.inspect_err(|err| self.reject(field, err.clone())).ok()
    }
}

/// Validates and normalizes a raw submission.
///
/// Names are trimmed, cron fields are joined by single spaces, timezones
/// take their canonical spelling and UUIDs their hyphenated lowercase form,
/// so normalizing an already-normalized definition yields the same value.
///
/// # Errors
///
/// Returns [`ValidationFailed`] listing every rejected field.
pub fn normalize(raw: &RawDefinitionFields) -> Result<DefinitionSettings, ValidationFailed> {
    let mut check = Collector::default();

    let database_id = check.uuid(FieldName::DatabaseId, raw.database_id.as_deref());
    let is_local = check.boolean(FieldName::IsLocal, raw.is_local.as_deref());
    let destination = match is_local {
        Some(true) => Some(DestinationMode::Local),
        Some(false) => check
            .uuid(FieldName::DestinationId, raw.destination_id.as_deref())
            .map(|id| DestinationMode::Remote(DestinationId::from_uuid(id))),
        None => {
            // Mode unknown: still report a malformed reference if one was sent.
            let sent = raw
                .destination_id
                .as_deref()
                .filter(|text| !text.trim().is_empty());
            if sent.is_some() {
                check.uuid(FieldName::DestinationId, sent);
            }
            None
        }
    };
    let name = check
        .required(FieldName::Name, raw.name.as_deref())
        .map(|text| text.trim().to_owned());
    let cron = check
        .required(FieldName::CronExpression, raw.cron_expression.as_deref())
        .and_then(|text| {
            check.domain(
                FieldName::CronExpression,
                CronSpec::parse(text).map_err(BackupDomainError::from),
            )
        });
    let time_zone = check
        .required(FieldName::TimeZone, raw.time_zone.as_deref())
        .and_then(|text| check.domain(FieldName::TimeZone, TimeZoneName::new(text)));
    let is_active = check.boolean(FieldName::IsActive, raw.is_active.as_deref());
    let dest_dir = check
        .required(FieldName::DestDir, raw.dest_dir.as_deref())
        .and_then(|text| check.domain(FieldName::DestDir, DestinationDir::new(text)));
    let retention = match raw.retention_days {
        Some(days) => check.domain(FieldName::RetentionDays, RetentionDays::new(days)),
        None => {
            check.reject(FieldName::RetentionDays, FieldProblem::Missing);
            None
        }
    };
    let options = dump_options(&mut check, raw);

    let (
        Some(database_id),
        Some(destination),
        Some(name),
        Some(cron),
        Some(time_zone),
        Some(is_active),
        Some(dest_dir),
        Some(retention),
        Some(options),
    ) = (
        database_id,
        destination,
        name,
        cron,
        time_zone,
        is_active,
        dest_dir,
        retention,
        options,
    )
    else {
        return Err(ValidationFailed {
            errors: check.errors,
        });
    };

    Ok(DefinitionSettings {
        database_id: DatabaseId::from_uuid(database_id),
        destination,
        name,
        schedule: Schedule::new(cron, time_zone),
        is_active,
        dest_dir,
        retention,
        options,
    })
}

fn dump_options(check: &mut Collector, raw: &RawDefinitionFields) -> Option<DumpOptions> {
    let data_only = check.boolean(FieldName::OptDataOnly, raw.opt_data_only.as_deref());
    let schema_only = check.boolean(FieldName::OptSchemaOnly, raw.opt_schema_only.as_deref());
    let clean = check.boolean(FieldName::OptClean, raw.opt_clean.as_deref());
    let if_exists = check.boolean(FieldName::OptIfExists, raw.opt_if_exists.as_deref());
    let create = check.boolean(FieldName::OptCreate, raw.opt_create.as_deref());
    let no_comments = check.boolean(FieldName::OptNoComments, raw.opt_no_comments.as_deref());

    Some(DumpOptions {
        data_only: data_only?,
        schema_only: schema_only?,
        clean: clean?,
        if_exists: if_exists?,
        create: create?,
        no_comments: no_comments?,
    })
}
