//! Given steps for backup scheduling BDD scenarios.

use super::world::{BackupWorld, instant, run_async};
use eyre::WrapErr;
use pgbackup_core::backup::domain::RawDefinitionFields;
use rstest_bdd_macros::given;

#[given(r#"the clock reads "{now}""#)]
fn clock_reads(world: &mut BackupWorld, now: String) -> Result<(), eyre::Report> {
    world.clock.set(instant(&now)?);
    Ok(())
}

#[given(r#"a local definition "{name}" with cron "{cron}" and retention {days:i64} days"#)]
fn local_definition(
    world: &mut BackupWorld,
    name: String,
    cron: String,
    days: i64,
) -> Result<(), eyre::Report> {
    let flag = |value: bool| Some(value.to_string());
    let fields = RawDefinitionFields {
        database_id: Some("5b7e3c1a-2f4d-4e6a-8c9b-0a1b2c3d4e5f".to_owned()),
        destination_id: None,
        is_local: flag(true),
        name: Some(name.clone()),
        cron_expression: Some(cron),
        time_zone: Some("UTC".to_owned()),
        is_active: flag(true),
        dest_dir: Some(format!("/{name}")),
        retention_days: Some(days),
        opt_data_only: flag(false),
        opt_schema_only: flag(false),
        opt_clean: flag(false),
        opt_if_exists: flag(false),
        opt_create: flag(false),
        opt_no_comments: flag(false),
    };
    let definition = run_async(world.service.create_definition(&fields))
        .wrap_err_with(|| format!("create definition {name}"))?;
    world.definitions.insert(name, definition.id());
    Ok(())
}

#[given(r#"the next dump fails with "{message}""#)]
fn next_dump_fails(world: &mut BackupWorld, message: String) {
    world.storage.fail_next_dump(message);
}
