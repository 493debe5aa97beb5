//! Runs one backup per dispatch and applies retention afterwards.

use super::resolver::DestinationResolver;
use crate::backup::{
    domain::{
        ArtifactId, BackupDefinition, BackupDefinitionId, BackupDomainError, BackupRun,
        ResolvedDestination,
    },
    ports::{
        BackupRepositoryError, BackupRunRepository, BackupStorage, DestinationCatalog, DumpRequest,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors returned by [`RunDispatcher::dispatch`].
///
/// Dump and destination failures are not errors here: they produce a
/// `failed` run.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A run for the definition is still in flight.
    #[error("a run for definition {0} is already in progress")]
    AlreadyRunning(BackupDefinitionId),
    /// A run lifecycle rule was broken.
    #[error(transparent)]
    Domain(#[from] BackupDomainError),
    /// The pending run could not be stored.
    #[error(transparent)]
    Repository(#[from] BackupRepositoryError),
}

/// Result type for run dispatch.
pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Executes a definition at a fire instant.
#[async_trait]
pub trait RunDispatcher: Send + Sync + 'static {
    /// Runs `definition` for `scheduled_for` and returns the finished run.
    async fn dispatch(
        &self,
        definition: &BackupDefinition,
        scheduled_for: DateTime<Utc>,
    ) -> ExecutionResult<BackupRun>;
}

type InFlight = Arc<Mutex<HashSet<BackupDefinitionId>>>;

/// Releases a definition's execution slot when dropped.
struct RunSlot {
    in_flight: InFlight,
    definition_id: BackupDefinitionId,
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.definition_id);
    }
}

/// Enforces one in-flight run per definition, records outcomes and prunes
/// expired artifacts after each success.
pub struct ExecutionCoordinator<R, S, L, C>
where
    R: BackupRunRepository,
    S: BackupStorage,
    L: DestinationCatalog,
    C: Clock + Send + Sync,
{
    runs: Arc<R>,
    storage: Arc<S>,
    resolver: DestinationResolver<L>,
    clock: Arc<C>,
    in_flight: InFlight,
}

impl<R, S, L, C> ExecutionCoordinator<R, S, L, C>
where
    R: BackupRunRepository,
    S: BackupStorage,
    L: DestinationCatalog,
    C: Clock + Send + Sync,
{
    /// Creates a coordinator.
    #[must_use]
    pub fn new(
        runs: Arc<R>,
        storage: Arc<S>,
        resolver: DestinationResolver<L>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            runs,
            storage,
            resolver,
            clock,
            in_flight: Arc::default(),
        }
    }

    /// Returns whether a run for `definition_id` is in flight.
    #[must_use]
    pub fn is_running(&self, definition_id: BackupDefinitionId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&definition_id)
    }

    fn claim(&self, definition_id: BackupDefinitionId) -> ExecutionResult<RunSlot> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(definition_id) {
            return Err(ExecutionError::AlreadyRunning(definition_id));
        }
        Ok(RunSlot {
            in_flight: Arc::clone(&self.in_flight),
            definition_id,
        })
    }

    async fn execute(
        &self,
        definition: &BackupDefinition,
        scheduled_for: DateTime<Utc>,
    ) -> ExecutionResult<BackupRun> {
        let mut run = BackupRun::pending(definition.id(), scheduled_for);
        self.runs.store_run(&run).await?;

        let destination = match self.resolver.resolve_definition(definition).await {
            Ok(destination) => destination,
            Err(err) => {
                warn!(
                    definition_id = %definition.id(),
                    run_id = %run.id(),
                    error = %err,
                    "destination resolution failed"
                );
                run.fail(err.to_string(), &*self.clock)?;
                self.record(&run).await;
                return Ok(run);
            }
        };

        run.start(&*self.clock)?;
        self.record(&run).await;

        let request = DumpRequest {
            definition_id: definition.id(),
            run_id: run.id(),
            database_id: definition.database_id(),
            artifact_key: destination.artifact_key(
                scheduled_for,
                definition.schedule().time_zone(),
                run.id(),
            ),
            destination,
            options: definition.options(),
        };
        match self.storage.run_dump(&request).await {
            Ok(artifact) => {
                run.succeed(artifact.clone(), &*self.clock)?;
                self.record(&run).await;
                info!(
                    definition_id = %definition.id(),
                    run_id = %run.id(),
                    artifact = %artifact,
                    "backup succeeded"
                );
                self.prune(definition, &request.destination, &artifact).await;
            }
            Err(err) => {
                warn!(
                    definition_id = %definition.id(),
                    run_id = %run.id(),
                    error = %err,
                    "backup failed"
                );
                run.fail(err.to_string(), &*self.clock)?;
                self.record(&run).await;
            }
        }
        Ok(run)
    }

    /// Persists a status change. Failures are logged, never returned.
    async fn record(&self, run: &BackupRun) {
        match self.runs.update_run(run).await {
            Ok(()) => {}
            Err(BackupRepositoryError::RunNotFound(run_id)) => {
                warn!(
                    definition_id = %run.definition_id(),
                    %run_id,
                    status = %run.status(),
                    "run history removed while the run was in flight"
                );
            }
            Err(err) => {
                error!(
                    definition_id = %run.definition_id(),
                    run_id = %run.id(),
                    status = %run.status(),
                    error = %err,
                    "could not record run status"
                );
            }
        }
    }

    /// Deletes expired artifacts that this definition's own runs produced.
    ///
    /// Other files under the destination directory, including artifacts of
    /// definitions sharing or nesting inside it, are never candidates.
    async fn prune(
        &self,
        definition: &BackupDefinition,
        destination: &ResolvedDestination,
        produced: &ArtifactId,
    ) {
        if definition.retention().is_disabled() {
            return;
        }
        let mut owners: BTreeMap<ArtifactId, BackupRun> = match self
            .runs
            .list_runs(definition.id())
            .await
        {
            Ok(runs) => runs
                .into_iter()
                .filter_map(|run| run.artifact().cloned().map(|artifact| (artifact, run)))
                .collect(),
            Err(err) => {
                warn!(
                    definition_id = %definition.id(),
                    error = %err,
                    "could not load run history for retention"
                );
                return;
            }
        };
        let mut artifacts = match self.storage.list_artifacts(destination).await {
            Ok(artifacts) => artifacts,
            Err(err) => {
                warn!(
                    definition_id = %definition.id(),
                    error = %err,
                    "could not list artifacts for retention"
                );
                return;
            }
        };
        artifacts
            .retain(|artifact| &artifact.id == produced || owners.contains_key(&artifact.id));
        let mut expired = definition
            .retention_policy()
            .expired(&artifacts, self.clock.utc());
        expired.remove(produced);

        for artifact in expired {
            if let Err(err) = self.storage.delete_artifact(destination, &artifact).await {
                warn!(
                    definition_id = %definition.id(),
                    %artifact,
                    error = %err,
                    "failed to prune artifact"
                );
                continue;
            }
            info!(definition_id = %definition.id(), %artifact, "pruned expired artifact");
            if let Some(run) = owners.remove(&artifact) {
                self.forget_artifact(run).await;
            }
        }
    }

    async fn forget_artifact(&self, mut run: BackupRun) {
        if run.prune_artifact(&*self.clock)
            && let Err(err) = self.runs.update_run(&run).await
        {
            warn!(
                definition_id = %run.definition_id(),
                run_id = %run.id(),
                error = %err,
                "could not record prune"
            );
        }
    }
}

#[async_trait]
impl<R, S, L, C> RunDispatcher for ExecutionCoordinator<R, S, L, C>
where
    R: BackupRunRepository + 'static,
    S: BackupStorage + 'static,
    L: DestinationCatalog + 'static,
    C: Clock + Send + Sync + 'static,
{
    async fn dispatch(
        &self,
        definition: &BackupDefinition,
        scheduled_for: DateTime<Utc>,
    ) -> ExecutionResult<BackupRun> {
        let _slot = self.claim(definition.id())?;
        debug!(definition_id = %definition.id(), fire_at = %scheduled_for, "dispatching backup");
        self.execute(definition, scheduled_for).await
    }
}
