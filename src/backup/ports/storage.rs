//! Dump and artifact storage port.
//!
//! The collaborator behind this port runs the dump tool and moves bytes;
//! this crate only decides what to run, where, and what to delete.

use crate::backup::domain::{
    Artifact, ArtifactId, BackupDefinitionId, BackupRunId, DatabaseId, DumpOptions,
    ResolvedDestination,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for storage operations.
pub type BackupStorageResult<T> = Result<T, BackupStorageError>;

/// Everything the dump collaborator needs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRequest {
    /// Definition being executed.
    pub definition_id: BackupDefinitionId,
    /// Run being executed.
    pub run_id: BackupRunId,
    /// Database to dump.
    pub database_id: DatabaseId,
    /// Resolved write location.
    pub destination: ResolvedDestination,
    /// Key the artifact should be written under.
    pub artifact_key: ArtifactId,
    /// Dump tool switches.
    pub options: DumpOptions,
}

/// Dump execution and artifact management.
#[async_trait]
pub trait BackupStorage: Send + Sync {
    /// Runs the dump and stores its output, returning the artifact written.
    ///
    /// # Errors
    ///
    /// Returns [`BackupStorageError::DumpFailed`] when the tool or transfer
    /// fails.
    async fn run_dump(&self, request: &DumpRequest) -> BackupStorageResult<ArtifactId>;

    /// Lists artifacts stored under the destination directory, oldest first.
    async fn list_artifacts(
        &self,
        destination: &ResolvedDestination,
    ) -> BackupStorageResult<Vec<Artifact>>;

    /// Deletes one artifact.
    ///
    /// # Errors
    ///
    /// Returns [`BackupStorageError::ArtifactNotFound`] when it is already
    /// gone.
    async fn delete_artifact(
        &self,
        destination: &ResolvedDestination,
        artifact: &ArtifactId,
    ) -> BackupStorageResult<()>;
}

/// Errors returned by storage adapters.
#[derive(Debug, Clone, Error)]
pub enum BackupStorageError {
    /// The dump tool or transfer failed.
    #[error("dump failed: {0}")]
    DumpFailed(String),

    /// The artifact does not exist.
    #[error("artifact not found: {0}")]
    ArtifactNotFound(ArtifactId),

    /// Underlying I/O or transport failure.
    #[error("storage error: {0}")]
    Io(Arc<dyn std::error::Error + Send + Sync>),
}

impl BackupStorageError {
    /// Wraps an I/O error.
    pub fn io(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Io(Arc::new(err))
    }
}
