//! Then steps for cache deployment BDD scenarios.

use super::world::{CacheWorld, configuration_id, run_async};
use deckhand::compiler::CompileError;
use deckhand::configuration::domain::DeploymentStatus;
use deckhand::deployment::services::DeploymentError;
use rstest_bdd_macros::then;

#[then(r#"the deploy of "{id}" fails with a port conflict suggesting {port:u16}"#)]
fn port_conflict_suggested(world: &CacheWorld, id: String, port: u16) -> Result<(), eyre::Report> {
    let failure = world
        .failures
        .get(&id)
        .ok_or_else(|| eyre::eyre!("deploy of '{id}' did not fail"))?;
    let DeploymentError::PortConflict { report, .. } = failure else {
        return Err(eyre::eyre!("expected a port conflict, got {failure}"));
    };
    let suggested = report
        .conflicts
        .first()
        .and_then(|conflict| conflict.suggested_port);
    if suggested != Some(port) {
        return Err(eyre::eyre!("expected suggestion {port}, got {suggested:?}"));
    }
    Ok(())
}

#[then(r#"the deploy of "{id}" fails with unresolved variable "{name}""#)]
fn unresolved_variable(world: &CacheWorld, id: String, name: String) -> Result<(), eyre::Report> {
    let failure = world
        .failures
        .get(&id)
        .ok_or_else(|| eyre::eyre!("deploy of '{id}' did not fail"))?;
    match failure {
        DeploymentError::Compile(CompileError::UnresolvedVariable { name: missing, .. })
            if *missing == name =>
        {
            Ok(())
        }
        other => Err(eyre::eyre!("expected unresolved '{name}', got {other}")),
    }
}

#[then(r#""{first}" and "{second}" are both running"#)]
fn both_running(world: &CacheWorld, first: String, second: String) -> Result<(), eyre::Report> {
    for id in [&first, &second] {
        let configuration = run_async(world.manager.store().get(&configuration_id(id)?))
            .map_err(|err| eyre::eyre!("lookup of '{id}' failed: {err}"))?;
        if configuration.status() != DeploymentStatus::Running {
            return Err(eyre::eyre!(
                "expected '{id}' to be running, found {}",
                configuration.status()
            ));
        }
    }
    let running = world
        .local()
        .running()
        .map_err(|err| eyre::eyre!("runtime unavailable: {err}"))?;
    if running != [first.clone(), second.clone()] {
        return Err(eyre::eyre!("unexpected running containers: {running:?}"));
    }
    Ok(())
}

#[then(r#"the container "{name}" runs image "{image}""#)]
fn container_image(world: &CacheWorld, name: String, image: String) -> Result<(), eyre::Report> {
    let (spec, _) = world
        .local()
        .container(&name)
        .map_err(|err| eyre::eyre!("runtime unavailable: {err}"))?
        .ok_or_else(|| eyre::eyre!("container '{name}' does not exist"))?;
    if spec.image != image {
        return Err(eyre::eyre!("expected image '{image}', found '{}'", spec.image));
    }
    Ok(())
}

#[then("no container was created")]
fn no_container_created(world: &CacheWorld) -> Result<(), eyre::Report> {
    let attempts = world
        .local()
        .create_attempts()
        .map_err(|err| eyre::eyre!("runtime unavailable: {err}"))?;
    if attempts != 0 {
        return Err(eyre::eyre!("expected no create calls, saw {attempts}"));
    }
    Ok(())
}
