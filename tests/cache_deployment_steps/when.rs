//! When steps for cache deployment BDD scenarios.

use super::world::{CacheWorld, configuration_id, run_async};
use deckhand::deployment::services::DeploymentError;
use eyre::WrapErr;
use rstest_bdd_macros::when;

#[when(r#""{id}" is deployed"#)]
fn configuration_deployed(world: &mut CacheWorld, id: String) -> Result<(), eyre::Report> {
    let configuration = configuration_id(&id)?;
    match run_async(world.manager.deploy(&configuration)) {
        Ok(_) => {
            world.failures.remove(&id);
        }
        Err(err) => {
            world.failures.insert(id, err);
        }
    }
    Ok(())
}

#[when(r#"the suggested port is applied to "{id}""#)]
fn suggestion_applied(world: &mut CacheWorld, id: String) -> Result<(), eyre::Report> {
    let Some(DeploymentError::PortConflict { report, .. }) = world.failures.get(&id) else {
        return Err(eyre::eyre!("no port conflict recorded for '{id}'"));
    };
    let conflict = report
        .conflicts
        .first()
        .ok_or_else(|| eyre::eyre!("port conflict report for '{id}' is empty"))?;
    let port = conflict
        .suggested_port
        .ok_or_else(|| eyre::eyre!("no free port was suggested for '{id}'"))?;
    let env_var = conflict.env_var.clone();

    let configuration = configuration_id(&id)?;
    run_async(
        world
            .manager
            .store()
            .apply_override(&configuration, &env_var, port),
    )
    .wrap_err("apply suggested port")?;
    Ok(())
}
