//! Retention behaviour across scheduled runs.

use super::helpers::{BackupStack, at, stack, submission};
use pgbackup_core::backup::domain::{Artifact, ArtifactId, RunStatus};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn artifacts_older_than_the_window_are_pruned_after_a_success(stack: BackupStack) {
    let definition = stack
        .service
        .create_definition(&submission("orders", "0 0 * * *", "/orders", 2))
        .await
        .expect("definition should be created");

    for day in ["2024-01-02", "2024-01-03", "2024-01-04", "2024-01-05"] {
        stack.tick_at(at(&format!("{day}T00:00:00Z"))).await;
    }

    let kept: Vec<_> = stack
        .storage
        .artifacts()
        .into_iter()
        .map(|artifact| artifact.created_at)
        .collect();
    assert_eq!(
        kept,
        vec![
            at("2024-01-03T00:00:00Z"),
            at("2024-01-04T00:00:00Z"),
            at("2024-01-05T00:00:00Z"),
        ]
    );

    let runs = stack
        .service
        .list_runs(definition.id())
        .await
        .expect("runs should be listed");
    let pruned: Vec<_> = runs
        .iter()
        .filter(|run| run.artifact_pruned_at().is_some())
        .map(|run| run.scheduled_for())
        .collect();
    assert_eq!(pruned, vec![at("2024-01-02T00:00:00Z")]);
    assert!(runs.iter().all(|run| run.status() == RunStatus::Succeeded));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn pruning_only_removes_artifacts_the_definition_produced(stack: BackupStack) {
    stack
        .service
        .create_definition(&submission("orders", "0 0 * * *", "/orders", 1))
        .await
        .expect("definition should be created");
    let foreign = Artifact::new(
        ArtifactId::new("orders-archive/2023/06/01/dump.zip"),
        at("2023-06-01T00:00:00Z"),
    );
    let unowned = Artifact::new(
        ArtifactId::new("orders/2023/06/01/dump.zip"),
        at("2023-06-01T00:00:00Z"),
    );
    stack.storage.insert_artifact(foreign.clone());
    stack.storage.insert_artifact(unowned.clone());

    stack.tick_at(at("2024-01-02T00:00:00Z")).await;
    stack.tick_at(at("2024-01-04T00:00:00Z")).await;

    let remaining: Vec<_> = stack
        .storage
        .artifacts()
        .into_iter()
        .map(|artifact| artifact.id)
        .collect();
    assert!(remaining.contains(&foreign.id));
    assert!(remaining.contains(&unowned.id));
    assert_eq!(remaining.len(), 3, "the first scheduled dump was pruned");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn nested_directories_keep_their_own_retention(stack: BackupStack) {
    let parent = stack
        .service
        .create_definition(&submission("orders", "0 0 * * *", "/orders", 1))
        .await
        .expect("parent definition should be created");
    let monthly = stack
        .service
        .create_definition(&submission("orders-monthly", "0 0 2 * *", "/orders/monthly", 365))
        .await
        .expect("nested definition should be created");

    for day in ["2024-01-02", "2024-01-03", "2024-01-04"] {
        stack.tick_at(at(&format!("{day}T00:00:00Z"))).await;
    }

    let monthly_runs = stack
        .service
        .list_runs(monthly.id())
        .await
        .expect("runs should be listed");
    let monthly_artifact = monthly_runs
        .first()
        .and_then(|run| run.artifact().cloned())
        .expect("monthly artifact still recorded");
    let remaining: Vec<_> = stack
        .storage
        .artifacts()
        .into_iter()
        .map(|artifact| artifact.id)
        .collect();
    assert!(remaining.contains(&monthly_artifact));

    let parent_pruned = stack
        .service
        .list_runs(parent.id())
        .await
        .expect("runs should be listed")
        .iter()
        .filter(|run| run.artifact_pruned_at().is_some())
        .count();
    assert_eq!(parent_pruned, 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_runs_never_prune(stack: BackupStack) {
    stack
        .service
        .create_definition(&submission("orders", "0 0 * * *", "/orders", 1))
        .await
        .expect("definition should be created");
    let stale = Artifact::new(
        ArtifactId::new("orders/2023/06/01/dump.zip"),
        at("2023-06-01T00:00:00Z"),
    );
    stack.storage.insert_artifact(stale.clone());
    stack.storage.fail_next_dump("connection refused");

    stack.tick_at(at("2024-01-02T00:00:00Z")).await;

    assert_eq!(stack.storage.artifacts(), vec![stale]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn disabled_retention_keeps_everything(stack: BackupStack) {
    stack
        .service
        .create_definition(&submission("orders", "0 0 * * *", "/orders", 0))
        .await
        .expect("definition should be created");
    stack.storage.insert_artifact(Artifact::new(
        ArtifactId::new("orders/2020/01/01/dump.zip"),
        at("2020-01-01T00:00:00Z"),
    ));

    stack.tick_at(at("2024-01-02T00:00:00Z")).await;

    assert_eq!(stack.storage.artifacts().len(), 2);
}
