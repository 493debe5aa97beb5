//! End-to-end definition lifecycle over the in-memory stack.

use super::helpers::{BackupStack, at, stack, submission};
use camino::Utf8PathBuf;
use pgbackup_core::backup::{
    domain::{DestinationId, DestinationRoot, RemoteDestination, RunStatus},
    services::{DefinitionServiceError, DestinationError, ScheduleState, TriggerError},
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn scheduled_definition_writes_under_its_local_directory(stack: BackupStack) {
    let definition = stack
        .service
        .create_definition(&submission("orders", "*/15 * * * *", "/orders", 7))
        .await
        .expect("definition should be created");

    assert_eq!(stack.tick_at(at("2024-01-01T00:14:59Z")).await, 0);
    assert_eq!(stack.tick_at(at("2024-01-01T00:15:00Z")).await, 1);

    let runs = stack
        .service
        .list_runs(definition.id())
        .await
        .expect("runs should be listed");
    let run = runs.first().expect("one run recorded");
    assert_eq!(runs.len(), 1);
    assert_eq!(run.status(), RunStatus::Succeeded);
    assert_eq!(run.scheduled_for(), at("2024-01-01T00:15:00Z"));
    let artifact = run.artifact().expect("artifact recorded");
    assert!(
        artifact
            .as_str()
            .starts_with("orders/2024/01/01/dump-20240101-001500-")
    );

    let requests = stack.storage.dump_requests();
    let request = requests.first().expect("one dump requested");
    assert_eq!(
        request.destination.local_directory(),
        Some(Utf8PathBuf::from("/srv/backups/orders"))
    );
    assert_eq!(request.options.to_args(), vec!["--clean", "--if-exists"]);
    assert!(!stack.coordinator.is_running(definition.id()));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn editing_the_cron_moves_the_next_fire(stack: BackupStack) {
    let definition = stack
        .service
        .create_definition(&submission("orders", "0 3 * * *", "/orders", 7))
        .await
        .expect("definition should be created");

    stack.clock.set(at("2024-01-01T01:00:00Z"));
    stack
        .service
        .update_definition(definition.id(), &submission("orders", "30 1 * * *", "/orders", 7))
        .await
        .expect("definition should be updated");

    assert_eq!(
        stack.scheduler.state_of(definition.id()),
        Some(ScheduleState::Scheduled(at("2024-01-01T01:30:00Z")))
    );
    assert_eq!(stack.tick_at(at("2024-01-01T01:30:00Z")).await, 1);
    assert_eq!(stack.tick_at(at("2024-01-01T03:00:00Z")).await, 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleted_definition_loses_history_and_stops_firing(stack: BackupStack) {
    let definition = stack
        .service
        .create_definition(&submission("orders", "* * * * *", "/orders", 7))
        .await
        .expect("definition should be created");
    stack.tick_at(at("2024-01-01T00:01:00Z")).await;

    stack
        .service
        .delete_definition(definition.id())
        .await
        .expect("definition should be deleted");

    assert_eq!(stack.tick_at(at("2024-01-01T00:02:00Z")).await, 0);
    assert!(stack.scheduler.state_of(definition.id()).is_none());
    assert!(matches!(
        stack.service.list_runs(definition.id()).await,
        Err(DefinitionServiceError::NotFound(id)) if id == definition.id()
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn remote_definition_dumps_to_the_registered_bucket(stack: BackupStack) {
    let remote = RemoteDestination {
        id: DestinationId::new(),
        name: "offsite".to_owned(),
        bucket_name: "nightly-dumps".to_owned(),
        region: "us-east-1".to_owned(),
        endpoint: "https://s3.us-east-1.amazonaws.com".to_owned(),
    };
    stack
        .catalog
        .register(remote.clone())
        .expect("destination should register");
    let mut fields = submission("orders", "0 * * * *", "/orders", 7);
    fields.is_local = Some("false".to_owned());
    fields.destination_id = Some(remote.id.to_string());
    let definition = stack
        .service
        .create_definition(&fields)
        .await
        .expect("definition should be created");

    let run = stack
        .scheduler
        .trigger_now(definition.id())
        .await
        .expect("manual trigger should run");

    assert_eq!(run.status(), RunStatus::Succeeded);
    let requests = stack.storage.dump_requests();
    let request = requests.first().expect("one dump requested");
    assert_eq!(request.destination.root(), &DestinationRoot::Remote(remote));
    assert_eq!(request.destination.local_directory(), None);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_remote_destination_is_rejected_before_persisting(stack: BackupStack) {
    let missing = DestinationId::new();
    let mut fields = submission("orders", "0 * * * *", "/orders", 7);
    fields.is_local = Some("false".to_owned());
    fields.destination_id = Some(missing.to_string());

    let result = stack.service.create_definition(&fields).await;

    assert!(matches!(
        result,
        Err(DefinitionServiceError::Destination(DestinationError::DestinationNotFound(id)))
            if id == missing
    ));
    let stored = stack
        .service
        .list_definitions()
        .await
        .expect("definitions should be listed");
    assert!(stored.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deactivated_definition_can_still_be_triggered_manually(stack: BackupStack) {
    let definition = stack
        .service
        .create_definition(&submission("orders", "* * * * *", "/orders", 7))
        .await
        .expect("definition should be created");
    stack
        .service
        .set_active(definition.id(), false)
        .await
        .expect("definition should be deactivated");

    assert_eq!(stack.tick_at(at("2024-01-01T00:10:00Z")).await, 0);
    assert_eq!(
        stack.scheduler.state_of(definition.id()),
        Some(ScheduleState::Inactive)
    );
    let run = stack
        .scheduler
        .trigger_now(definition.id())
        .await
        .expect("manual trigger should run");
    assert_eq!(run.scheduled_for(), at("2024-01-01T00:10:00Z"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn trigger_for_unknown_definition_is_rejected(stack: BackupStack) {
    let unknown = pgbackup_core::backup::domain::BackupDefinitionId::new();

    let result = stack.scheduler.trigger_now(unknown).await;

    assert!(matches!(result, Err(TriggerError::UnknownDefinition(id)) if id == unknown));
}
