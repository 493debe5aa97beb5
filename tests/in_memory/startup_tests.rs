//! Rebuilding the schedule from stored definitions after a restart.

use super::helpers::{BackupStack, Scheduler, Service, at, stack, submission};
use pgbackup_core::backup::{
    domain::BackupDefinitionId,
    services::{BackupDefinitionService, BackupScheduler, DestinationResolver, ScheduleState},
};
use pgbackup_core::config::SchedulerSettings;
use rstest::rstest;
use std::sync::Arc;

fn restarted_scheduler(stack: &BackupStack) -> Arc<Scheduler> {
    Arc::new(BackupScheduler::new(
        Arc::clone(&stack.coordinator),
        Arc::new(stack.clock.clone()),
        SchedulerSettings::default(),
    ))
}

fn restarted_service(stack: &BackupStack, scheduler: &Arc<Scheduler>) -> Service {
    BackupDefinitionService::new(
        Arc::clone(&stack.repository),
        DestinationResolver::new(Arc::clone(&stack.catalog), "/srv/backups"),
        Arc::clone(scheduler),
        Arc::new(stack.clock.clone()),
    )
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stored_definitions_are_scheduled_on_load(stack: BackupStack) {
    let nightly = stack
        .service
        .create_definition(&submission("orders", "0 2 * * *", "/orders", 7))
        .await
        .expect("definition should be created");
    let mut paused_fields = submission("ledger", "*/5 * * * *", "/ledger", 7);
    paused_fields.is_active = Some("false".to_owned());
    let paused = stack
        .service
        .create_definition(&paused_fields)
        .await
        .expect("definition should be created");

    let scheduler = restarted_scheduler(&stack);
    scheduler.load(
        stack
            .service
            .list_definitions()
            .await
            .expect("definitions should be listed"),
    );

    assert_eq!(
        scheduler.state_of(nightly.id()),
        Some(ScheduleState::Scheduled(at("2024-01-01T02:00:00Z")))
    );
    assert_eq!(scheduler.state_of(paused.id()), Some(ScheduleState::Inactive));
    assert_eq!(scheduler.next_due(), Some(at("2024-01-01T02:00:00Z")));

    stack.clock.set(at("2024-01-01T02:00:00Z"));
    let handles = scheduler.tick();
    assert_eq!(handles.len(), 1);
    for handle in handles {
        handle.await.expect("dispatch task should not panic");
    }
    let runs = stack
        .service
        .list_runs(nightly.id())
        .await
        .expect("runs should be listed");
    assert_eq!(runs.len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unreadable_definition_is_restored_as_faulted(stack: BackupStack) {
    let healthy = stack
        .service
        .create_definition(&submission("orders", "0 2 * * *", "/orders", 7))
        .await
        .expect("definition should be created");
    let corrupt = BackupDefinitionId::new();
    stack
        .repository
        .insert_corrupt(corrupt, "unknown time zone: Mars/Olympus_Mons")
        .expect("corrupt entry should be stored");

    let scheduler = restarted_scheduler(&stack);
    let service = restarted_service(&stack, &scheduler);
    let listing = service
        .restore_schedule()
        .await
        .expect("schedule should be restored");

    assert_eq!(listing.definitions.len(), 1);
    assert_eq!(listing.faulted.len(), 1);
    assert_eq!(
        scheduler.state_of(healthy.id()),
        Some(ScheduleState::Scheduled(at("2024-01-01T02:00:00Z")))
    );
    assert_eq!(scheduler.state_of(corrupt), Some(ScheduleState::Inactive));
    assert!(
        scheduler
            .fault_of(corrupt)
            .is_some_and(|reason| reason.contains("Mars/Olympus_Mons"))
    );
    let listed = service
        .list_definitions()
        .await
        .expect("definitions should be listed");
    assert_eq!(listed, vec![healthy]);

    service
        .delete_definition(corrupt)
        .await
        .expect("faulted definition should be deletable");
    assert!(scheduler.state_of(corrupt).is_none());
}
