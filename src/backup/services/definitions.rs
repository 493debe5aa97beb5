//! Service layer for creating and managing backup definitions.

use super::{
    resolver::{DestinationError, DestinationResolver},
    scheduler::ScheduleSink,
};
use crate::backup::{
    domain::{
        BackupDefinition, BackupDefinitionId, BackupDomainError, BackupRun, CronError, CronSpec,
        DefinitionSettings, FieldName, FieldProblem, RawDefinitionFields, ValidationFailed,
        normalize,
    },
    ports::{
        BackupDefinitionRepository, BackupRepositoryError, BackupRunRepository,
        DefinitionListing, DestinationCatalog,
    },
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Service-level errors for definition management.
#[derive(Debug, Error)]
pub enum DefinitionServiceError {
    /// Submitted fields were rejected.
    #[error(transparent)]
    Validation(#[from] ValidationFailed),
    /// The destination does not exist or its path is unsafe.
    #[error(transparent)]
    Destination(#[from] DestinationError),
    /// No definition with this identifier exists.
    #[error("backup definition {0} not found")]
    NotFound(BackupDefinitionId),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(BackupRepositoryError),
}

impl From<BackupRepositoryError> for DefinitionServiceError {
    fn from(err: BackupRepositoryError) -> Self {
        match err {
            BackupRepositoryError::DefinitionNotFound(id) => Self::NotFound(id),
            other => Self::Repository(other),
        }
    }
}

/// Result type for definition service operations.
pub type DefinitionServiceResult<T> = Result<T, DefinitionServiceError>;

/// Checks a cron expression for interactive feedback.
///
/// Failures carry the same field error a full save would report, so a
/// blank expression is [`FieldProblem::Missing`].
///
/// # Errors
///
/// Returns [`ValidationFailed`] for the `cron_expression` field.
pub fn validate_cron(expression: &str) -> Result<CronSpec, ValidationFailed> {
    CronSpec::parse(expression).map_err(|err| match err {
        CronError::Empty => {
            ValidationFailed::single(FieldName::CronExpression, FieldProblem::Missing)
        }
        other => {
            ValidationFailed::single(FieldName::CronExpression, BackupDomainError::from(other))
        }
    })
}

/// Validates submissions, persists definitions and keeps the schedule in
/// step with every change.
#[derive(Clone)]
pub struct BackupDefinitionService<R, L, S, C>
where
    R: BackupDefinitionRepository + BackupRunRepository,
    L: DestinationCatalog,
    S: ScheduleSink,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    resolver: DestinationResolver<L>,
    schedule: Arc<S>,
    clock: Arc<C>,
}

impl<R, L, S, C> BackupDefinitionService<R, L, S, C>
where
    R: BackupDefinitionRepository + BackupRunRepository,
    L: DestinationCatalog,
    S: ScheduleSink,
    C: Clock + Send + Sync,
{
    /// Creates a new definition service.
    #[must_use]
    pub const fn new(
        repository: Arc<R>,
        resolver: DestinationResolver<L>,
        schedule: Arc<S>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            repository,
            resolver,
            schedule,
            clock,
        }
    }

    /// Validates a submission, persists it and schedules it when active.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionServiceError::Validation`] for malformed fields,
    /// [`DefinitionServiceError::Destination`] for an unknown remote
    /// destination, or a repository error. Nothing is persisted on error.
    pub async fn create_definition(
        &self,
        raw: &RawDefinitionFields,
    ) -> DefinitionServiceResult<BackupDefinition> {
        let settings = self.validated(raw).await?;
        let definition = BackupDefinition::new(settings, &*self.clock);
        self.repository.store(&definition).await?;
        self.schedule.definition_saved(&definition);
        info!(
            definition_id = %definition.id(),
            name = definition.name(),
            cron = %definition.schedule().cron(),
            "backup definition created"
        );
        Ok(definition)
    }

    /// Retrieves a definition.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionServiceError::NotFound`] for an unknown id.
    pub async fn get_definition(
        &self,
        id: BackupDefinitionId,
    ) -> DefinitionServiceResult<BackupDefinition> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(DefinitionServiceError::NotFound(id))
    }

    /// Replaces every field of a definition after full re-validation and
    /// reschedules it from the current instant.
    ///
    /// # Errors
    ///
    /// As for [`Self::create_definition`], plus
    /// [`DefinitionServiceError::NotFound`].
    pub async fn update_definition(
        &self,
        id: BackupDefinitionId,
        raw: &RawDefinitionFields,
    ) -> DefinitionServiceResult<BackupDefinition> {
        let mut definition = self.get_definition(id).await?;
        let settings = self.validated(raw).await?;
        definition.replace_settings(settings, &*self.clock);
        self.repository.update(&definition).await?;
        self.schedule.definition_saved(&definition);
        info!(definition_id = %id, "backup definition updated");
        Ok(definition)
    }

    /// Activates or deactivates a definition. Run history is kept.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionServiceError::NotFound`] or a repository error.
    pub async fn set_active(
        &self,
        id: BackupDefinitionId,
        active: bool,
    ) -> DefinitionServiceResult<BackupDefinition> {
        let mut definition = self.get_definition(id).await?;
        definition.set_active(active, &*self.clock);
        self.repository.update(&definition).await?;
        self.schedule.definition_saved(&definition);
        info!(definition_id = %id, active, "backup definition activation changed");
        Ok(definition)
    }

    /// Deletes a definition with its runs and cancels its pending fire.
    ///
    /// A run already in flight is not aborted.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionServiceError::NotFound`] or a repository error.
    pub async fn delete_definition(&self, id: BackupDefinitionId) -> DefinitionServiceResult<()> {
        self.repository.delete(id).await?;
        self.schedule.definition_removed(id);
        info!(definition_id = %id, "backup definition deleted");
        Ok(())
    }

    /// Lists every usable definition, oldest first.
    ///
    /// Stored definitions that no longer validate are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns a repository error.
    pub async fn list_definitions(&self) -> DefinitionServiceResult<Vec<BackupDefinition>> {
        let listing = self.repository.list().await?;
        for faulted in &listing.faulted {
            warn!(
                definition_id = %faulted.id,
                reason = %faulted.reason,
                "skipping unreadable definition"
            );
        }
        Ok(listing.definitions)
    }

    /// Registers every stored definition with the schedule, typically at
    /// startup.
    ///
    /// Definitions that no longer validate are registered as faulted so they
    /// stay visible as `Inactive` instead of hiding the rest.
    ///
    /// # Errors
    ///
    /// Returns a repository error when the listing itself fails.
    pub async fn restore_schedule(&self) -> DefinitionServiceResult<DefinitionListing> {
        let listing = self.repository.list().await?;
        for definition in &listing.definitions {
            self.schedule.definition_saved(definition);
        }
        for faulted in &listing.faulted {
            self.schedule.definition_faulted(faulted.id, &faulted.reason);
        }
        info!(
            definitions = listing.definitions.len(),
            faulted = listing.faulted.len(),
            "schedule restored from storage"
        );
        Ok(listing)
    }

    /// Lists the runs of a definition, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionServiceError::NotFound`] or a repository error.
    pub async fn list_runs(
        &self,
        id: BackupDefinitionId,
    ) -> DefinitionServiceResult<Vec<BackupRun>> {
        self.get_definition(id).await?;
        Ok(self.repository.list_runs(id).await?)
    }

    async fn validated(
        &self,
        raw: &RawDefinitionFields,
    ) -> DefinitionServiceResult<DefinitionSettings> {
        let settings = normalize(raw)?;
        self.resolver
            .resolve(settings.destination, settings.dest_dir.as_str())
            .await?;
        Ok(settings)
    }
}
