//! Shared fixtures wiring the services over in-memory adapters.

use std::sync::Arc;

use crate::backup::{
    adapters::memory::{InMemoryBackupRepository, InMemoryBackupStorage, InMemoryDestinationCatalog},
    domain::{BackupDefinition, RawDefinitionFields, RemoteDestination, normalize},
    services::{
        BackupDefinitionService, BackupScheduler, DestinationResolver, ExecutionCoordinator,
    },
};
use crate::clock::ManualClock;
use crate::config::SchedulerSettings;
use chrono::{DateTime, Utc};

pub(crate) type TestStorage = InMemoryBackupStorage<ManualClock>;
pub(crate) type TestCoordinator = ExecutionCoordinator<
    InMemoryBackupRepository,
    TestStorage,
    InMemoryDestinationCatalog,
    ManualClock,
>;
pub(crate) type TestScheduler = BackupScheduler<TestCoordinator, ManualClock>;
pub(crate) type TestService = BackupDefinitionService<
    InMemoryBackupRepository,
    InMemoryDestinationCatalog,
    TestScheduler,
    ManualClock,
>;

pub(crate) const DATABASE_ID: &str = "6f1c1d1e-6a55-4a8a-9a0e-1f2d3c4b5a69";

pub(crate) fn at(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

/// A complete local submission with every dump switch off.
pub(crate) fn local_fields(cron: &str, retention_days: i64) -> RawDefinitionFields {
    RawDefinitionFields {
        database_id: Some(DATABASE_ID.to_owned()),
        destination_id: None,
        is_local: Some("true".to_owned()),
        name: Some("nightly".to_owned()),
        cron_expression: Some(cron.to_owned()),
        time_zone: Some("UTC".to_owned()),
        is_active: Some("true".to_owned()),
        dest_dir: Some("/nightly".to_owned()),
        retention_days: Some(retention_days),
        opt_data_only: Some("false".to_owned()),
        opt_schema_only: Some("false".to_owned()),
        opt_clean: Some("false".to_owned()),
        opt_if_exists: Some("false".to_owned()),
        opt_create: Some("false".to_owned()),
        opt_no_comments: Some("false".to_owned()),
    }
}

/// Builds a definition without going through a service.
pub(crate) fn definition_from(fields: &RawDefinitionFields, clock: &ManualClock) -> BackupDefinition {
    BackupDefinition::new(normalize(fields).expect("valid submission"), clock)
}

pub(crate) fn remote_destination() -> RemoteDestination {
    RemoteDestination {
        id: crate::backup::domain::DestinationId::new(),
        name: "archive".to_owned(),
        bucket_name: "pg-dumps".to_owned(),
        region: "eu-west-1".to_owned(),
        endpoint: "https://s3.eu-west-1.amazonaws.com".to_owned(),
    }
}

/// Every service wired over in-memory adapters and one manual clock.
pub(crate) struct Harness {
    pub(crate) clock: ManualClock,
    pub(crate) repository: Arc<InMemoryBackupRepository>,
    pub(crate) catalog: Arc<InMemoryDestinationCatalog>,
    pub(crate) storage: Arc<TestStorage>,
    pub(crate) coordinator: Arc<TestCoordinator>,
    pub(crate) scheduler: Arc<TestScheduler>,
    pub(crate) service: TestService,
}

impl Harness {
    pub(crate) fn starting_at(now: &str) -> Self {
        let clock = ManualClock::new(at(now));
        let storage = InMemoryBackupStorage::new(clock.clone());
        Self::with_storage(clock, storage)
    }

    pub(crate) fn with_storage(clock: ManualClock, storage: TestStorage) -> Self {
        let repository = Arc::new(InMemoryBackupRepository::new());
        let catalog = Arc::new(InMemoryDestinationCatalog::new());
        let storage = Arc::new(storage);
        let shared_clock = Arc::new(clock.clone());
        let coordinator = Arc::new(ExecutionCoordinator::new(
            Arc::clone(&repository),
            Arc::clone(&storage),
            DestinationResolver::new(Arc::clone(&catalog), "/backups"),
            Arc::clone(&shared_clock),
        ));
        let scheduler = Arc::new(BackupScheduler::new(
            Arc::clone(&coordinator),
            Arc::clone(&shared_clock),
            SchedulerSettings::default(),
        ));
        let service = BackupDefinitionService::new(
            Arc::clone(&repository),
            DestinationResolver::new(Arc::clone(&catalog), "/backups"),
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
}
