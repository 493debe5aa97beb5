//! Domain model for backup definitions, schedules, runs and retention.
//!
//! Everything here is pure: no persistence, no filesystem access and no
//! process execution. Time is read only through [`mockable::Clock`].

mod cron;
mod definition;
mod destination;
mod error;
mod ids;
mod options;
mod retention;
mod run;
mod schedule;
mod validation;

pub use cron::{CronError, CronField, CronSpec};
pub use definition::{BackupDefinition, DefinitionSettings, PersistedDefinitionData};
pub use destination::{
    DestinationDir, DestinationMode, DestinationRoot, RemoteDestination, ResolvedDestination,
};
pub use error::{BackupDomainError, ParseRunStatusError};
pub use ids::{ArtifactId, BackupDefinitionId, BackupRunId, DatabaseId, DestinationId};
pub use options::DumpOptions;
pub use retention::{Artifact, RetentionDays, RetentionPolicy};
pub use run::{BackupRun, PersistedRunData, RunStatus};
pub use schedule::{Schedule, TimeZoneName};
pub use validation::{
    FieldError, FieldName, FieldProblem, RawDefinitionFields, ValidationFailed, normalize,
};
