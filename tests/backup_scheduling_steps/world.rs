//! Shared world state for backup scheduling BDD scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pgbackup_core::{
    backup::{
        adapters::memory::{
            InMemoryBackupRepository, InMemoryBackupStorage, InMemoryDestinationCatalog,
        },
        domain::{BackupDefinitionId, BackupRun},
        services::{
            BackupDefinitionService, BackupScheduler, DestinationResolver, ExecutionCoordinator,
        },
    },
    clock::ManualClock,
    config::SchedulerSettings,
};
use rstest::fixture;

/// Storage double stamped by the scenario clock.
pub type TestStorage = InMemoryBackupStorage<ManualClock>;

/// Coordinator used by the BDD world.
pub type TestCoordinator = ExecutionCoordinator<
    InMemoryBackupRepository,
    TestStorage,
    InMemoryDestinationCatalog,
    ManualClock,
>;

/// Scheduler used by the BDD world.
pub type TestScheduler = BackupScheduler<TestCoordinator, ManualClock>;

/// Definition service used by the BDD world.
pub type TestDefinitionService = BackupDefinitionService<
    InMemoryBackupRepository,
    InMemoryDestinationCatalog,
    TestScheduler,
    ManualClock,
>;

/// Scenario world for backup scheduling behaviour tests.
pub struct BackupWorld {
    pub clock: ManualClock,
    pub storage: Arc<TestStorage>,
    pub scheduler: Arc<TestScheduler>,
    pub service: TestDefinitionService,
    pub definitions: HashMap<String, BackupDefinitionId>,
}

impl BackupWorld {
    /// Creates a world with every service wired over in-memory adapters.
    #[must_use]
    pub fn new() -> Self {
        let clock = ManualClock::new(DateTime::<Utc>::UNIX_EPOCH);
        let shared_clock = Arc::new(clock.clone());
        let repository = Arc::new(InMemoryBackupRepository::new());
        let resolver =
            DestinationResolver::new(Arc::new(InMemoryDestinationCatalog::new()), "/backups");
        let storage = Arc::new(InMemoryBackupStorage::new(clock.clone()));
        let coordinator = Arc::new(ExecutionCoordinator::new(
            Arc::clone(&repository),
            Arc::clone(&storage),
            resolver.clone(),
            Arc::clone(&shared_clock),
        ));
        let scheduler = Arc::new(BackupScheduler::new(
            coordinator,
            Arc::clone(&shared_clock),
            SchedulerSettings::default(),
        ));
        let service = BackupDefinitionService::new(
            repository,
            resolver,
            Arc::clone(&scheduler),
            shared_clock,
        );
        Self {
            clock,
            storage,
            scheduler,
            service,
            definitions: HashMap::new(),
        }
    }

    /// Looks up a definition created earlier in the scenario.
    pub fn definition_id(&self, name: &str) -> Result<BackupDefinitionId, eyre::Report> {
        self.definitions
            .get(name)
            .copied()
            .ok_or_else(|| eyre::eyre!("definition {name} was not created in this scenario"))
    }

    /// Lists the runs of a named definition, newest first.
    pub fn runs_of(&self, name: &str) -> Result<Vec<BackupRun>, eyre::Report> {
        let id = self.definition_id(name)?;
        run_async(self.service.list_runs(id)).map_err(|err| eyre::eyre!("list runs: {err}"))
    }
}

impl Default for BackupWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> BackupWorld {
    BackupWorld::default()
}

/// Parses an RFC 3339 instant from a step.
pub fn instant(text: &str) -> Result<DateTime<Utc>, eyre::Report> {
    DateTime::parse_from_rfc3339(text)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| eyre::eyre!("invalid instant {text}: {err}"))
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
