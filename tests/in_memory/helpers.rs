//! Shared wiring for in-memory backup integration tests.

use chrono::{DateTime, Utc};
use pgbackup_core::{
    backup::{
        adapters::memory::{
            InMemoryBackupRepository, InMemoryBackupStorage, InMemoryDestinationCatalog,
        },
        domain::RawDefinitionFields,
        services::{
            BackupDefinitionService, BackupScheduler, DestinationResolver, ExecutionCoordinator,
        },
    },
    clock::ManualClock,
    config::BackupSettings,
};
use rstest::fixture;
use std::sync::Arc;

/// Settings every stack in these tests is wired from.
pub const SETTINGS_JSON: &str = r#"{
    "local_backup_root": "/srv/backups",
    "scheduler": { "max_sleep_secs": 5 },
    "log": { "filter": "pgbackup_core=debug", "ansi": false }
}"#;

/// Storage double stamped by the shared manual clock.
pub type Storage = InMemoryBackupStorage<ManualClock>;

/// Coordinator over in-memory adapters.
pub type Coordinator =
    ExecutionCoordinator<InMemoryBackupRepository, Storage, InMemoryDestinationCatalog, ManualClock>;

/// Scheduler dispatching to [`Coordinator`].
pub type Scheduler = BackupScheduler<Coordinator, ManualClock>;

/// Definition service feeding [`Scheduler`].
pub type Service = BackupDefinitionService<
    InMemoryBackupRepository,
    InMemoryDestinationCatalog,
    Scheduler,
    ManualClock,
>;

/// Parses an RFC 3339 timestamp.
///
/// # Panics
///
/// Panics when `text` is not a valid timestamp.
pub fn at(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

/// A complete local submission writing under `dest_dir`.
pub fn submission(name: &str, cron: &str, dest_dir: &str, retention_days: i64) -> RawDefinitionFields {
    let flag = |value: bool| Some(value.to_string());
    RawDefinitionFields {
        database_id: Some("0d6c2f5e-3b1a-4c8e-9f7d-2a4b6c8d0e1f".to_owned()),
        destination_id: None,
        is_local: flag(true),
        name: Some(name.to_owned()),
        cron_expression: Some(cron.to_owned()),
        time_zone: Some("UTC".to_owned()),
        is_active: flag(true),
        dest_dir: Some(dest_dir.to_owned()),
        retention_days: Some(retention_days),
        opt_data_only: flag(false),
        opt_schema_only: flag(false),
        opt_clean: flag(true),
        opt_if_exists: flag(true),
        opt_create: flag(false),
        opt_no_comments: flag(false),
    }
}

/// Every backup service wired over in-memory adapters.
pub struct BackupStack {
    /// Clock shared by every component.
    pub clock: ManualClock,
    /// Definition and run persistence.
    pub repository: Arc<InMemoryBackupRepository>,
    /// Remote destination records.
    pub catalog: Arc<InMemoryDestinationCatalog>,
    /// Dump and artifact storage.
    pub storage: Arc<Storage>,
    /// Run dispatcher.
    pub coordinator: Arc<Coordinator>,
    /// Timer loop.
    pub scheduler: Arc<Scheduler>,
    /// Definition management.
    pub service: Service,
}

impl BackupStack {
    /// Wires a stack from [`SETTINGS_JSON`] whose clock reads `now`.
    ///
    /// # Panics
    ///
    /// Panics when the test settings are rejected.
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        let settings = BackupSettings::from_json(SETTINGS_JSON).expect("test settings parse");
        settings.validate().expect("test settings are valid");
        Self::configured(now, &settings)
    }

    /// Wires a stack from `settings` whose clock reads `now`.
    pub fn configured(now: DateTime<Utc>, settings: &BackupSettings) -> Self {
        let clock = ManualClock::new(now);
        let shared_clock = Arc::new(clock.clone());
        let repository = Arc::new(InMemoryBackupRepository::new());
        let catalog = Arc::new(InMemoryDestinationCatalog::new());
        let storage = Arc::new(InMemoryBackupStorage::new(clock.clone()));
        let resolver = DestinationResolver::new(Arc::clone(&catalog), settings.local_backup_root.clone());
        let coordinator = Arc::new(ExecutionCoordinator::new(
            Arc::clone(&repository),
            Arc::clone(&storage),
            resolver.clone(),
            Arc::clone(&shared_clock),
        ));
        let scheduler = Arc::new(BackupScheduler::new(
            Arc::clone(&coordinator),
            Arc::clone(&shared_clock),
            settings.scheduler,
        ));
        let service = BackupDefinitionService::new(
            Arc::clone(&repository),
            resolver,
            Arc::clone(&scheduler),
            shared_clock,
        );
        Self {
            clock,
            repository,
            catalog,
            storage,
            coordinator,
            scheduler,
            service,
        }
    }

    /// Moves the clock to `now` and waits for every run the scheduler
    /// dispatches.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> usize {
        self.clock.set(now);
        let handles = self.scheduler.tick();
        let dispatched = handles.len();
        for handle in handles {
            handle.await.expect("dispatch task should not panic");
        }
        dispatched
    }
}

/// Provides a stack starting just after midnight on 2024-01-01.
#[fixture]
pub fn stack() -> BackupStack {
    BackupStack::starting_at(at("2024-01-01T00:00:30Z"))
}
