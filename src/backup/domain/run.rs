//! Execution attempts of a backup definition.

use super::{ArtifactId, BackupDefinitionId, BackupDomainError, BackupRunId, ParseRunStatusError};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Run lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, destination not yet resolved.
    Pending,
    /// Dump in progress.
    Running,
    /// Artifact produced.
    Succeeded,
    /// Dump, transfer or destination resolution failed.
    Failed,
}

impl RunStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Returns whether the run has finished.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Running | Self::Failed)
                | (Self::Running, Self::Succeeded | Self::Failed)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RunStatus {
    type Error = ParseRunStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseRunStatusError(value.to_owned())),
        }
    }
}

/// One execution attempt of a definition at a fire instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRun {
    id: BackupRunId,
    definition_id: BackupDefinitionId,
    scheduled_for: DateTime<Utc>,
    status: RunStatus,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    error: Option<String>,
    artifact: Option<ArtifactId>,
    artifact_pruned_at: Option<DateTime<Utc>>,
}

/// Parameter object for reconstructing a persisted run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedRunData {
    /// Persisted identifier.
    pub id: BackupRunId,
    /// Owning definition.
    pub definition_id: BackupDefinitionId,
    /// Fire instant the run was dispatched for.
    pub scheduled_for: DateTime<Utc>,
    /// Persisted status.
    pub status: RunStatus,
    /// When the dump started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run finished.
    pub finished_at: Option<DateTime<Utc>>,
    /// Failure message.
    pub error: Option<String>,
    /// Produced artifact.
    pub artifact: Option<ArtifactId>,
    /// When the artifact was removed by retention.
    pub artifact_pruned_at: Option<DateTime<Utc>>,
}

impl BackupRun {
    /// Creates a pending run for a fire instant.
    #[must_use]
    pub fn pending(definition_id: BackupDefinitionId, scheduled_for: DateTime<Utc>) -> Self {
        Self {
            id: BackupRunId::new(),
            definition_id,
            scheduled_for,
            status: RunStatus::Pending,
            started_at: None,
            finished_at: None,
            error: None,
            artifact: None,
            artifact_pruned_at: None,
        }
    }

    /// Reconstructs a run from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedRunData) -> Self {
        Self {
            id: data.id,
            definition_id: data.definition_id,
            scheduled_for: data.scheduled_for,
            status: data.status,
            started_at: data.started_at,
            finished_at: data.finished_at,
            error: data.error,
            artifact: data.artifact,
            artifact_pruned_at: data.artifact_pruned_at,
        }
    }

    /// Returns the run identifier.
    #[must_use]
    pub const fn id(&self) -> BackupRunId {
        self.id
    }

    /// Returns the owning definition.
    #[must_use]
    pub const fn definition_id(&self) -> BackupDefinitionId {
        self.definition_id
    }

    /// Returns the fire instant.
    #[must_use]
    pub const fn scheduled_for(&self) -> DateTime<Utc> {
        self.scheduled_for
    }

    /// Returns the status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Returns when the dump started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns when the run finished.
    #[must_use]
    pub const fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Returns the failure message, present only for failed runs.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the produced artifact, present only for succeeded runs whose
    /// artifact has not been pruned.
    #[must_use]
    pub const fn artifact(&self) -> Option<&ArtifactId> {
        self.artifact.as_ref()
    }

    /// Returns when retention removed the artifact.
    #[must_use]
    pub const fn artifact_pruned_at(&self) -> Option<DateTime<Utc>> {
        self.artifact_pruned_at
    }

    /// Moves a pending run to running.
    ///
    /// # Errors
    ///
    /// Returns [`BackupDomainError::InvalidRunTransition`] unless pending.
    pub fn start(&mut self, clock: &impl Clock) -> Result<(), BackupDomainError> {
        self.transition(RunStatus::Running)?;
        self.started_at = Some(clock.utc());
        Ok(())
    }

    /// Records the produced artifact and finishes the run.
    ///
    /// # Errors
    ///
    /// Returns [`BackupDomainError::InvalidRunTransition`] unless running.
    pub fn succeed(&mut self, artifact: ArtifactId, clock: &impl Clock) -> Result<(), BackupDomainError> {
        self.transition(RunStatus::Succeeded)?;
        self.artifact = Some(artifact);
        self.finished_at = Some(clock.utc());
        Ok(())
    }

    /// Records a failure and finishes the run.
    ///
    /// # Errors
    ///
    /// Returns [`BackupDomainError::InvalidRunTransition`] when the run has
    /// already finished.
    pub fn fail(&mut self, message: impl Into<String>, clock: &impl Clock) -> Result<(), BackupDomainError> {
        self.transition(RunStatus::Failed)?;
        self.error = Some(message.into());
        self.finished_at = Some(clock.utc());
        Ok(())
    }

    /// Drops the artifact reference after retention deleted it.
    ///
    /// Returns `false` when there was no artifact to drop.
    pub fn prune_artifact(&mut self, clock: &impl Clock) -> bool {
        if self.artifact.take().is_none() {
            return false;
        }
        self.artifact_pruned_at = Some(clock.utc());
        true
    }

    fn transition(&mut self, target: RunStatus) -> Result<(), BackupDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(BackupDomainError::InvalidRunTransition {
                run_id: self.id,
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        Ok(())
    }
}
