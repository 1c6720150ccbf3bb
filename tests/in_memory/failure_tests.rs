//! Transient retries, rejections, readiness timeouts and crash detection.

use crate::in_memory::helpers::{Harness, harness, id};
use deckhand::configuration::domain::{DeploymentStatus, FailureKind};
use deckhand::deployment::{
    domain::ExitInfo,
    ports::BackendError,
    services::DeploymentError,
};
use rstest::rstest;

async fn failure_kind(harness: &Harness, raw: &str) -> Option<FailureKind> {
    let configuration = harness
        .manager
        .store()
        .get(&id(raw))
        .await
        .expect("lookup");
    assert_eq!(configuration.status(), DeploymentStatus::Error);
    configuration.last_failure().map(|failure| failure.kind)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rate_limited_submits_are_retried(harness: Harness) {
    harness.local().rate_limit_creates(2).expect("inject");
    let cache = harness.create("cache-a", "cache").await;

    let deployed = harness.manager.deploy(&cache).await.expect("deploy");

    assert_eq!(deployed.status(), DeploymentStatus::Running);
    assert_eq!(harness.local().create_attempts().expect("count"), 3);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn retries_stop_after_the_configured_attempts(harness: Harness) {
    harness.local().rate_limit_creates(10).expect("inject");
    let cache = harness.create("cache-a", "cache").await;

    let error = harness.manager.deploy(&cache).await.expect_err("still limited");

    assert!(matches!(
        error,
        DeploymentError::Backend {
            source: BackendError::RateLimited { .. },
            ..
        }
    ));
    assert_eq!(harness.local().create_attempts().expect("count"), 3);
    assert_eq!(failure_kind(&harness, "cache-a").await, Some(FailureKind::Backend));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejections_are_not_retried(harness: Harness) {
    harness
        .local()
        .reject("cache-a", "image not allowed")
        .expect("inject");
    let cache = harness.create("cache-a", "cache").await;

    let error = harness.manager.deploy(&cache).await.expect_err("rejected");

    assert!(matches!(
        error,
        DeploymentError::BackendRejected { ref reason, .. } if reason == "image not allowed"
    ));
    assert_eq!(harness.local().create_attempts().expect("count"), 1);
    assert_eq!(
        failure_kind(&harness, "cache-a").await,
        Some(FailureKind::BackendRejected)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn containers_that_never_start_time_out(harness: Harness) {
    harness.local().stall("cache-a").expect("inject");
    let cache = harness.create("cache-a", "cache").await;

    let error = harness.manager.deploy(&cache).await.expect_err("stalled");

    assert!(matches!(
        error,
        DeploymentError::BackendTimeout { ref last_condition, .. } if last_condition == "created: 0/1 replicas ready"
    ));
    assert_eq!(
        failure_kind(&harness, "cache-a").await,
        Some(FailureKind::BackendTimeout)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn exit_during_startup_is_a_runtime_crash(harness: Harness) {
    harness
        .local()
        .crash_on_start("cache-a", ExitInfo::new(Some(1), "bad config"))
        .expect("inject");
    let cache = harness.create("cache-a", "cache").await;

    let error = harness.manager.deploy(&cache).await.expect_err("crashed");

    assert!(matches!(
        error,
        DeploymentError::RuntimeCrash { ref exit, .. } if exit.code == Some(1)
    ));
    assert_eq!(harness.local().create_attempts().expect("count"), 1);
    assert_eq!(
        failure_kind(&harness, "cache-a").await,
        Some(FailureKind::RuntimeCrash)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_configurations_can_be_undeployed(harness: Harness) {
    harness.local().stall("cache-a").expect("inject");
    let cache = harness.create("cache-a", "cache").await;
    harness.manager.deploy(&cache).await.expect_err("stalled");

    let stopped = harness.manager.undeploy(&cache).await.expect("undeploy");

    assert_eq!(stopped.status(), DeploymentStatus::Stopped);
    assert!(harness.local().container("cache-a").expect("runtime").is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn crashes_after_running_are_detected_and_not_retried(harness: Harness) {
    let cache = harness.create("cache-a", "cache").await;
    harness.manager.deploy(&cache).await.expect("deploy");
    let crashed = harness
        .local()
        .crash("cache-a", ExitInfo::new(Some(137), "OOMKilled"))
        .expect("crash");
    assert!(crashed);

    let refreshed = harness.manager.refresh_status(&cache).await.expect("refresh");

    assert_eq!(refreshed.status(), DeploymentStatus::Error);
    let failure = refreshed.last_failure().expect("failure recorded");
    assert_eq!(failure.kind, FailureKind::RuntimeCrash);
    assert!(failure.message.contains("137"));
    assert_eq!(harness.local().create_attempts().expect("count"), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn refresh_all_reports_only_crashed_configurations(harness: Harness) {
    let healthy = harness.create("cache-a", "cache").await;
    let doomed = harness.create("cache-b", "cache").await;
    harness.manager.deploy(&healthy).await.expect("deploy");
    harness
        .manager
        .store()
        .apply_override(&doomed, "HOST_PORT_6379", 6380_u16)
        .await
        .expect("override");
    harness.manager.deploy(&doomed).await.expect("deploy");
    harness
        .local()
        .crash("cache-b", ExitInfo::new(None, "killed"))
        .expect("crash");

    let crashed = harness.manager.refresh_all().await.expect("refresh");

    assert_eq!(crashed, vec![doomed]);
    let still_running = harness.manager.store().get(&healthy).await.expect("lookup");
    assert_eq!(still_running.status(), DeploymentStatus::Running);
}
