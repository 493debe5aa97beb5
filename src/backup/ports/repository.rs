//! Repository ports for definition and run persistence.

use crate::backup::domain::{BackupDefinition, BackupDefinitionId, BackupRun, BackupRunId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for backup repository operations.
pub type BackupRepositoryResult<T> = Result<T, BackupRepositoryError>;

/// Definition persistence contract (`backup_definitions` table).
#[async_trait]
pub trait BackupDefinitionRepository: Send + Sync {
    /// Stores a new definition.
    ///
    /// # Errors
    ///
    /// Returns [`BackupRepositoryError::DuplicateDefinition`] when the
    /// identifier already exists.
    async fn store(&self, definition: &BackupDefinition) -> BackupRepositoryResult<()>;

    /// Replaces an existing definition.
    ///
    /// # Errors
    ///
    /// Returns [`BackupRepositoryError::DefinitionNotFound`] when the
    /// definition does not exist.
    async fn update(&self, definition: &BackupDefinition) -> BackupRepositoryResult<()>;

    /// Deletes a definition together with all of its runs.
    ///
    /// # Errors
    ///
    /// Returns [`BackupRepositoryError::DefinitionNotFound`] when the
    /// definition does not exist.
    async fn delete(&self, id: BackupDefinitionId) -> BackupRepositoryResult<()>;

    /// Finds a definition by identifier.
    async fn find_by_id(
        &self,
        id: BackupDefinitionId,
    ) -> BackupRepositoryResult<Option<BackupDefinition>>;

    /// Returns every stored definition, oldest first.
    ///
    /// Rows that no longer reconstruct into a valid definition are reported
    /// in [`DefinitionListing::faulted`] instead of failing the listing.
    async fn list(&self) -> BackupRepositoryResult<DefinitionListing>;
}

/// Run persistence contract (`backup_runs` table).
#[async_trait]
pub trait BackupRunRepository: Send + Sync {
    /// Stores a new run.
    ///
    /// # Errors
    ///
    /// Returns [`BackupRepositoryError::DefinitionNotFound`] when the owning
    /// definition does not exist or
    /// [`BackupRepositoryError::DuplicateRun`] for a reused identifier.
    async fn store_run(&self, run: &BackupRun) -> BackupRepositoryResult<()>;

    /// Persists a run's status change.
    ///
    /// # Errors
    ///
    /// Returns [`BackupRepositoryError::RunNotFound`] when the run no longer
    /// exists, for example after its definition was deleted.
    async fn update_run(&self, run: &BackupRun) -> BackupRepositoryResult<()>;

    /// Returns a definition's runs, most recently scheduled first.
    async fn list_runs(
        &self,
        definition_id: BackupDefinitionId,
    ) -> BackupRepositoryResult<Vec<BackupRun>>;

}

/// A stored definition that could not be reconstructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultedDefinition {
    /// Identifier of the stored row.
    pub id: BackupDefinitionId,
    /// Why the row was rejected.
    pub reason: String,
}

/// Stored definitions split into usable and faulted entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionListing {
    /// Valid definitions, oldest first.
    pub definitions: Vec<BackupDefinition>,
    /// Rows whose stored fields no longer validate.
    pub faulted: Vec<FaultedDefinition>,
}

/// Errors returned by backup repository implementations.
#[derive(Debug, Clone, Error)]
pub enum BackupRepositoryError {
    /// A definition with the same identifier already exists.
    #[error("duplicate backup definition: {0}")]
    DuplicateDefinition(BackupDefinitionId),

    /// The definition was not found.
    #[error("backup definition not found: {0}")]
    DefinitionNotFound(BackupDefinitionId),

    /// A run with the same identifier already exists.
    #[error("duplicate backup run: {0}")]
    DuplicateRun(BackupRunId),

    /// The run was not found.
    #[error("backup run not found: {0}")]
    RunNotFound(BackupRunId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl BackupRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
