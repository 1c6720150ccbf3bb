//! Per-configuration serialization of deploy, undeploy and overrides.

use crate::in_memory::helpers::{Harness, harness};
use deckhand::configuration::{domain::DeploymentStatus, services::ConfigurationStoreError};
use deckhand::deployment::services::DeploymentError;
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_deploys_of_one_configuration_let_exactly_one_proceed(harness: Harness) {
    harness.local().stall("cache-a").expect("inject");
    let cache = harness.create("cache-a", "cache").await;

    let (first, second) = tokio::join!(
        harness.manager.deploy(&cache),
        harness.manager.deploy(&cache)
    );

    let conflicts = [&first, &second]
        .iter()
        .filter(|outcome| matches!(outcome, Err(DeploymentError::Conflict(_))))
        .count();
    assert_eq!(conflicts, 1);
    assert_eq!(harness.local().create_attempts().expect("count"), 1);

    let third = harness.manager.deploy(&cache).await;

    assert!(!matches!(third, Err(DeploymentError::Conflict(_))));
    assert!(matches!(third, Err(DeploymentError::BackendTimeout { .. })));
    assert_eq!(harness.local().create_attempts().expect("count"), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn different_configurations_deploy_in_parallel(harness: Harness) {
    let first = harness.create("cache-a", "cache").await;
    let second = harness.create("cache-b", "cache").await;
    harness
        .manager
        .store()
        .apply_override(&second, "HOST_PORT_6379", 6380_u16)
        .await
        .expect("override");

    let (a, b) = tokio::join!(harness.manager.deploy(&first), harness.manager.deploy(&second));

    assert_eq!(a.expect("first deploy").status(), DeploymentStatus::Running);
    assert_eq!(b.expect("second deploy").status(), DeploymentStatus::Running);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn undeploy_waits_for_an_in_flight_deploy(harness: Harness) {
    harness.local().stall("cache-a").expect("inject");
    let cache = harness.create("cache-a", "cache").await;

    let (deployed, undeployed) = tokio::join!(
        harness.manager.deploy(&cache),
        harness.manager.undeploy(&cache)
    );

    assert!(matches!(deployed, Err(DeploymentError::BackendTimeout { .. })));
    assert_eq!(
        undeployed.expect("undeploy").status(),
        DeploymentStatus::Stopped
    );
    assert!(harness.local().container("cache-a").expect("runtime").is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn a_second_pending_undeploy_fails_fast(harness: Harness) {
    harness.local().stall("cache-a").expect("inject");
    let cache = harness.create("cache-a", "cache").await;

    let (_, first, second) = tokio::join!(
        harness.manager.deploy(&cache),
        harness.manager.undeploy(&cache),
        harness.manager.undeploy(&cache)
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(DeploymentError::Conflict(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn overrides_are_refused_during_a_deploy(harness: Harness) {
    harness.local().stall("cache-a").expect("inject");
    let cache = harness.create("cache-a", "cache").await;

    let (_, overridden) = tokio::join!(
        harness.manager.deploy(&cache),
        harness
            .manager
            .store()
            .apply_override(&cache, "CACHE_MAXMEMORY", "1gb")
    );

    assert!(matches!(overridden, Err(ConfigurationStoreError::Conflict(_))));
}
