//! Deploy, redeploy, undeploy and remove against the in-memory runtime.

use crate::in_memory::helpers::{Harness, cache_template, harness, harness_with, id};
use deckhand::configuration::{
    domain::{DeploymentStatus, RuntimeRefs},
    services::ConfigurationStoreError,
};
use deckhand::deployment::{domain::ContainerState, services::DeploymentError};
use deckhand::template::adapters::StaticEnvironment;
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deploy_runs_the_cache_container(harness: Harness) {
    let cache = harness.create("cache-a", "cache").await;

    let deployed = harness.manager.deploy(&cache).await.expect("deploy");

    assert_eq!(deployed.status(), DeploymentStatus::Running);
    let record = deployed.record().expect("deployment record");
    assert_eq!(record.bound_ports, vec![6379]);
    assert!(matches!(
        record.refs,
        RuntimeRefs::Container { ref name, .. } if name == "cache-a"
    ));

    let (spec, state) = harness
        .local()
        .container("cache-a")
        .expect("runtime")
        .expect("container exists");
    assert_eq!(state, ContainerState::Running);
    assert_eq!(spec.image, "registry/cache:latest");
    assert_eq!(
        spec.labels.get("app.kubernetes.io/managed-by").map(String::as_str),
        Some("deckhand")
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn image_variables_come_from_the_process_environment() {
    let harness = harness_with(
        vec![cache_template()],
        StaticEnvironment::new().with("CACHE_TAG", "7.2"),
    );
    let cache = harness.create("cache-a", "cache").await;

    harness.manager.deploy(&cache).await.expect("deploy");

    let (spec, _) = harness
        .local()
        .container("cache-a")
        .expect("runtime")
        .expect("container exists");
    assert_eq!(spec.image, "registry/cache:7.2");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn image_override_beats_environment_and_env_default() {
    let harness = harness_with(
        vec![cache_template().with_env("CACHE_TAG", "stale")],
        StaticEnvironment::new().with("CACHE_TAG", "7.2"),
    );
    let cache = harness.create("cache-a", "cache").await;

    harness.manager.deploy(&cache).await.expect("first deploy");
    let (from_environment, _) = harness
        .local()
        .container("cache-a")
        .expect("runtime")
        .expect("container exists");
    harness
        .manager
        .store()
        .apply_override(&cache, "CACHE_TAG", "7.4")
        .await
        .expect("override");
    harness.manager.deploy(&cache).await.expect("second deploy");
    let (from_override, _) = harness
        .local()
        .container("cache-a")
        .expect("runtime")
        .expect("container exists");

    assert_eq!(from_environment.image, "registry/cache:7.2");
    assert_eq!(from_override.image, "registry/cache:7.4");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn redeploying_an_unchanged_configuration_is_a_no_op(harness: Harness) {
    let cache = harness.create("cache-a", "cache").await;
    let first = harness.manager.deploy(&cache).await.expect("first deploy");

    let second = harness.manager.deploy(&cache).await.expect("second deploy");

    assert_eq!(harness.local().create_attempts().expect("count"), 1);
    assert_eq!(first.record(), second.record());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn changed_overrides_replace_the_running_container(harness: Harness) {
    let cache = harness.create("cache-a", "cache").await;
    harness.manager.deploy(&cache).await.expect("first deploy");
    harness
        .manager
        .store()
        .apply_override(&cache, "CACHE_MAXMEMORY", "1gb")
        .await
        .expect("override");

    let redeployed = harness.manager.deploy(&cache).await.expect("redeploy");

    assert_eq!(redeployed.status(), DeploymentStatus::Running);
    assert_eq!(harness.local().create_attempts().expect("count"), 2);
    assert_eq!(harness.local().running().expect("running"), vec!["cache-a"]);
    let (spec, _) = harness
        .local()
        .container("cache-a")
        .expect("runtime")
        .expect("container exists");
    assert_eq!(spec.env.get("CACHE_MAXMEMORY").map(String::as_str), Some("1gb"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn undeploy_stops_and_removes_the_container(harness: Harness) {
    let cache = harness.create("cache-a", "cache").await;
    harness.manager.deploy(&cache).await.expect("deploy");

    let stopped = harness.manager.undeploy(&cache).await.expect("undeploy");

    assert_eq!(stopped.status(), DeploymentStatus::Stopped);
    assert!(stopped.record().is_none());
    assert!(harness.local().container("cache-a").expect("runtime").is_none());

    let again = harness.manager.undeploy(&cache).await.expect("second undeploy");
    assert_eq!(again.status(), DeploymentStatus::Stopped);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn undeploying_a_pending_configuration_changes_nothing(harness: Harness) {
    let cache = harness.create("cache-a", "cache").await;

    let result = harness.manager.undeploy(&cache).await.expect("undeploy");

    assert_eq!(result.status(), DeploymentStatus::Pending);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stopped_configurations_can_be_deployed_again(harness: Harness) {
    let cache = harness.create("cache-a", "cache").await;
    harness.manager.deploy(&cache).await.expect("deploy");
    harness.manager.undeploy(&cache).await.expect("undeploy");

    let redeployed = harness.manager.deploy(&cache).await.expect("redeploy");

    assert_eq!(redeployed.status(), DeploymentStatus::Running);
    assert_eq!(harness.local().running().expect("running"), vec!["cache-a"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn remove_tears_down_and_deletes(harness: Harness) {
    let cache = harness.create("cache-a", "cache").await;
    harness.manager.deploy(&cache).await.expect("deploy");

    harness.manager.remove(&cache).await.expect("remove");

    assert!(harness.local().running().expect("running").is_empty());
    assert!(matches!(
        harness.manager.store().get(&cache).await,
        Err(ConfigurationStoreError::NotFound(_))
    ));
    assert!(matches!(
        harness.manager.deploy(&id("cache-a")).await,
        Err(DeploymentError::Store(ConfigurationStoreError::NotFound(_)))
    ));
}
