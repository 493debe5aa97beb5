//! Error types for backup domain validation and parsing.

use super::{BackupRunId, CronError, RunStatus};
use thiserror::Error;

/// Errors returned while constructing or mutating domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackupDomainError {
    /// The cron expression does not parse.
    #[error("invalid cron expression: {0}")]
    InvalidCron(#[from] CronError),

    /// The timezone identifier is not in the timezone database.
    #[error("unknown time zone: {0}")]
    UnknownTimeZone(String),

    /// The destination directory is not a safe absolute-style path.
    #[error("unsafe destination directory '{path}': {reason}")]
    UnsafePath {
        /// Rejected path.
        path: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The retention window is outside `0..=36500` days.
    #[error("retention days {0} outside 0-36500")]
    RetentionOutOfRange(i64),

    /// The definition name is empty after trimming.
    #[error("backup name must not be empty")]
    EmptyName,

    /// A run status change not permitted by the run state machine.
    #[error("run {run_id} cannot move from {from} to {to}")]
    InvalidRunTransition {
        /// Run identifier.
        run_id: BackupRunId,
        /// Current status.
        from: RunStatus,
        /// Requested status.
        to: RunStatus,
    },
}

/// Error returned while parsing run statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown run status: {0}")]
pub struct ParseRunStatusError(pub String);
