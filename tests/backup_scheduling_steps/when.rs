//! When steps for backup scheduling BDD scenarios.

use super::world::{BackupWorld, instant, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::when;

#[when(r#"the scheduler ticks at "{now}""#)]
fn scheduler_ticks(world: &mut BackupWorld, now: String) -> Result<(), eyre::Report> {
    world.clock.set(instant(&now)?);
    for handle in world.scheduler.tick() {
        run_async(handle).wrap_err("dispatch task panicked")?;
    }
    Ok(())
}

#[when(r#"definition "{name}" is deactivated"#)]
fn definition_deactivated(world: &mut BackupWorld, name: String) -> Result<(), eyre::Report> {
    let id = world.definition_id(&name)?;
    run_async(world.service.set_active(id, false))
        .wrap_err_with(|| format!("deactivate definition {name}"))?;
    Ok(())
}
