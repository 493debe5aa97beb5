//! Then steps for backup scheduling BDD scenarios.

use super::world::{BackupWorld, instant};
use pgbackup_core::backup::{
    domain::RunStatus,
    services::ScheduleState,
};
use rstest_bdd_macros::then;

#[then(r#"the number of "{status}" runs for definition "{name}" is {expected:u64}"#)]
fn run_count_with_status(
    world: &BackupWorld,
    status: String,
    name: String,
    expected: u64,
) -> Result<(), eyre::Report> {
    let wanted = RunStatus::try_from(status.as_str()).map_err(|err| eyre::eyre!("{err}"))?;
    let runs = world.runs_of(&name)?;
    let found = u64::try_from(runs.iter().filter(|run| run.status() == wanted).count())?;
    if found != expected {
        return Err(eyre::eyre!(
            "expected {expected} {status} runs for {name}, found {found}"
        ));
    }
    Ok(())
}

#[then(r#"the failed run of definition "{name}" reports "{message}""#)]
fn failed_run_reports(world: &BackupWorld, name: String, message: String) -> Result<(), eyre::Report> {
    let runs = world.runs_of(&name)?;
    let failed = runs
        .iter()
        .find(|run| run.status() == RunStatus::Failed)
        .ok_or_else(|| eyre::eyre!("no failed run for {name}"))?;
    let error = failed.error().unwrap_or_default();
    if !error.contains(&message) {
        return Err(eyre::eyre!("expected error containing {message}, found {error}"));
    }
    Ok(())
}

#[then(r#"definition "{name}" is next due at "{due}""#)]
fn next_due_at(world: &BackupWorld, name: String, due: String) -> Result<(), eyre::Report> {
    let id = world.definition_id(&name)?;
    let expected = ScheduleState::Scheduled(instant(&due)?);
    let state = world.scheduler.state_of(id);
    if state != Some(expected) {
        return Err(eyre::eyre!("expected {expected:?}, found {state:?}"));
    }
    Ok(())
}

#[then(r#"definition "{name}" is inactive with a fault"#)]
fn inactive_with_fault(world: &BackupWorld, name: String) -> Result<(), eyre::Report> {
    let id = world.definition_id(&name)?;
    let state = world.scheduler.state_of(id);
    if state != Some(ScheduleState::Inactive) {
        return Err(eyre::eyre!("expected inactive schedule, found {state:?}"));
    }
    if world.scheduler.fault_of(id).is_none() {
        return Err(eyre::eyre!("expected a scheduling fault for {name}"));
    }
    Ok(())
}

#[then(r#"{expected:u64} artifacts remain for definition "{name}""#)]
fn artifacts_remain(world: &BackupWorld, expected: u64, name: String) -> Result<(), eyre::Report> {
    let prefix = format!("{name}/");
    let remaining = world
        .storage
        .artifacts()
        .iter()
        .filter(|artifact| artifact.id.as_str().starts_with(&prefix))
        .count();
    if u64::try_from(remaining)? != expected {
        return Err(eyre::eyre!(
            "expected {expected} artifacts for {name}, found {remaining}"
        ));
    }
    Ok(())
}

#[then(r#"the oldest run of definition "{name}" has its artifact pruned"#)]
fn oldest_run_pruned(world: &BackupWorld, name: String) -> Result<(), eyre::Report> {
    let runs = world.runs_of(&name)?;
    let oldest = runs
        .last()
        .ok_or_else(|| eyre::eyre!("no runs recorded for {name}"))?;
    if oldest.artifact_pruned_at().is_none() {
        return Err(eyre::eyre!("oldest run of {name} still owns its artifact"));
    }
    if runs.iter().rev().skip(1).any(|run| run.artifact_pruned_at().is_some()) {
        return Err(eyre::eyre!("a newer run of {name} lost its artifact"));
    }
    Ok(())
}
