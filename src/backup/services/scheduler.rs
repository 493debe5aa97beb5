//! Timer loop dispatching due definitions to a [`RunDispatcher`].

use super::{
    coordinator::{ExecutionError, RunDispatcher},
    registry::{DueFire, ScheduleRegistry, ScheduleState},
};
use crate::backup::domain::{BackupDefinition, BackupDefinitionId, BackupRun};
use crate::config::SchedulerSettings;
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Receives definition changes so the schedule stays current.
pub trait ScheduleSink: Send + Sync {
    /// A definition was created or changed.
    fn definition_saved(&self, definition: &BackupDefinition);
    /// A definition was deleted.
    fn definition_removed(&self, id: BackupDefinitionId);
    /// A stored definition could not be loaded.
    fn definition_faulted(&self, id: BackupDefinitionId, reason: &str);
}

/// Errors returned by [`BackupScheduler::trigger_now`].
#[derive(Debug, Error)]
pub enum TriggerError {
    /// The scheduler does not know the definition.
    #[error("definition {0} is not registered with the scheduler")]
    UnknownDefinition(BackupDefinitionId),
    /// Dispatch was rejected.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Single timer loop over a [`ScheduleRegistry`].
///
/// Dispatch is fire-and-continue: each due definition runs on its own task
/// so a slow backup never delays other fire instants.
pub struct BackupScheduler<E, C>
where
    E: RunDispatcher,
    C: Clock + Send + Sync,
{
    dispatcher: Arc<E>,
    clock: Arc<C>,
    registry: Mutex<ScheduleRegistry>,
    wake: Notify,
    max_sleep: Duration,
}

impl<E, C> BackupScheduler<E, C>
where
    E: RunDispatcher,
    C: Clock + Send + Sync,
{
    /// Creates a scheduler with an empty registry.
    #[must_use]
    pub fn new(dispatcher: Arc<E>, clock: Arc<C>, settings: SchedulerSettings) -> Self {
        Self {
            dispatcher,
            clock,
            registry: Mutex::new(ScheduleRegistry::new()),
            wake: Notify::new(),
            max_sleep: settings.max_sleep(),
        }
    }

    /// Registers stored definitions, typically at startup.
    pub fn load(&self, definitions: impl IntoIterator<Item = BackupDefinition>) {
        let now = self.clock.utc();
        let mut registry = self.registry();
        for definition in definitions {
            registry.upsert(definition, now);
        }
        info!(definitions = registry.len(), "schedule loaded");
        drop(registry);
        self.wake.notify_one();
    }

    /// Returns the scheduling state of a definition.
    #[must_use]
    pub fn state_of(&self, id: BackupDefinitionId) -> Option<ScheduleState> {
        self.registry().state_of(id)
    }

    /// Returns why a definition was taken out of the schedule.
    #[must_use]
    pub fn fault_of(&self, id: BackupDefinitionId) -> Option<String> {
        self.registry().fault_of(id).map(str::to_owned)
    }

    /// Returns the earliest pending fire instant.
    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.registry().next_due()
    }

    /// Dispatches every definition due now and returns the spawned tasks.
    #[must_use]
    pub fn tick(&self) -> Vec<JoinHandle<()>> {
        let due = self.registry().take_due(self.clock.utc());
        due.into_iter().map(|fire| self.spawn(fire)).collect()
    }

    /// Runs the timer loop until `shutdown` completes.
    ///
    /// In-flight runs are not aborted; they finish on their own tasks.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        info!(max_sleep_secs = self.max_sleep.as_secs(), "scheduler started");
        loop {
            // Runs finish on their own tasks.
            drop(self.tick());
            let sleep = self.sleep_duration();
            tokio::select! {
                () = &mut shutdown => break,
                () = tokio::time::sleep(sleep) => {}
                () = self.wake.notified() => {}
            }
        }
        info!("scheduler stopped");
    }

    /// Dispatches a definition immediately without moving its next fire.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::UnknownDefinition`] for an unregistered id,
    /// or [`TriggerError::Execution`] when dispatch is rejected, including
    /// [`ExecutionError::AlreadyRunning`].
    pub async fn trigger_now(&self, id: BackupDefinitionId) -> Result<BackupRun, TriggerError> {
        let definition = self
            .registry()
            .definition(id)
            .cloned()
            .ok_or(TriggerError::UnknownDefinition(id))?;
        let now = self.clock.utc();
        info!(definition_id = %id, fire_at = %now, "manual trigger");
        Ok(self.dispatcher.dispatch(&definition, now).await?)
    }

    fn sleep_duration(&self) -> Duration {
        let Some(next) = self.next_due() else {
            return self.max_sleep;
        };
        (next - self.clock.utc())
            .to_std()
            .map_or(Duration::ZERO, |until| until.min(self.max_sleep))
    }

    fn spawn(&self, fire: DueFire) -> JoinHandle<()> {
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            let DueFire {
                definition,
                fire_at,
            } = fire;
            let definition_id = definition.id();
            match dispatcher.dispatch(&definition, fire_at).await {
                Ok(run) => info!(
                    %definition_id,
                    run_id = %run.id(),
                    %fire_at,
                    status = %run.status(),
                    "scheduled run finished"
                ),
                Err(ExecutionError::AlreadyRunning(_)) => {
                    debug!(%definition_id, %fire_at, "previous run still in flight; skipping");
                }
                Err(err) => error!(%definition_id, %fire_at, error = %err, "dispatch failed"),
            }
        })
    }

    fn registry(&self) -> MutexGuard<'_, ScheduleRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E, C> ScheduleSink for BackupScheduler<E, C>
where
    E: RunDispatcher,
    C: Clock + Send + Sync,
{
    fn definition_saved(&self, definition: &BackupDefinition) {
        let state = self.registry().upsert(definition.clone(), self.clock.utc());
        debug!(definition_id = %definition.id(), ?state, "definition rescheduled");
        self.wake.notify_one();
    }

    fn definition_removed(&self, id: BackupDefinitionId) {
        if self.registry().remove(id) {
            debug!(definition_id = %id, "definition unscheduled");
        }
        self.wake.notify_one();
    }

    fn definition_faulted(&self, id: BackupDefinitionId, reason: &str) {
        self.registry().mark_faulted(id, reason);
        self.wake.notify_one();
    }
}
