//! Preflight conflicts and remediation by override.

use crate::in_memory::helpers::{Harness, harness, id};
use deckhand::allocation::domain::PortHolder;
use deckhand::configuration::domain::DeploymentStatus;
use deckhand::deployment::services::DeploymentError;
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn second_instance_is_told_the_next_free_port(harness: Harness) {
    let first = harness.create("cache-a", "cache").await;
    let second = harness.create("cache-b", "cache").await;
    harness.manager.deploy(&first).await.expect("first deploy");

    let error = harness
        .manager
        .deploy(&second)
        .await
        .expect_err("port 6379 is taken");

    let report = match error {
        DeploymentError::PortConflict { report, .. } => report,
        other => panic!("expected a port conflict, got {other}"),
    };
    let conflict = report.conflicts.first().expect("one conflict");
    assert_eq!(conflict.declared_port, 6379);
    assert_eq!(conflict.used_by, PortHolder::Configuration(id("cache-a")));
    assert_eq!(conflict.suggested_port, Some(6380));
    let pending = harness.manager.store().get(&second).await.expect("lookup");
    assert_eq!(pending.status(), DeploymentStatus::Pending);
    assert_eq!(harness.local().create_attempts().expect("count"), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn applying_the_suggestion_lets_both_instances_run(harness: Harness) {
    let first = harness.create("cache-a", "cache").await;
    let second = harness.create("cache-b", "cache").await;
    harness.manager.deploy(&first).await.expect("first deploy");
    let report = harness.manager.preflight(&second).await.expect("preflight");
    let conflict = report.conflicts.first().expect("one conflict");
    let suggested = conflict.suggested_port.expect("a suggestion");

    harness
        .manager
        .store()
        .apply_override(&second, &conflict.env_var, suggested)
        .await
        .expect("override");
    let deployed = harness.manager.deploy(&second).await.expect("second deploy");

    assert_eq!(deployed.status(), DeploymentStatus::Running);
    assert_eq!(
        deployed.record().map(|record| record.bound_ports.clone()),
        Some(vec![6380])
    );
    assert_eq!(
        harness.local().running().expect("running"),
        vec!["cache-a", "cache-b"]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unmanaged_containers_block_their_ports(harness: Harness) {
    harness
        .local()
        .occupy(6379, "legacy-cache")
        .expect("occupy");
    let cache = harness.create("cache-a", "cache").await;

    let report = harness.manager.preflight(&cache).await.expect("preflight");

    assert!(!report.can_start);
    assert_eq!(
        report.conflicts.first().map(|conflict| &conflict.used_by),
        Some(&PortHolder::External("container legacy-cache".to_owned()))
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn a_running_configuration_does_not_conflict_with_itself(harness: Harness) {
    let cache = harness.create("cache-a", "cache").await;
    harness.manager.deploy(&cache).await.expect("deploy");

    let report = harness.manager.preflight(&cache).await.expect("preflight");

    assert!(report.can_start);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stopped_instances_free_their_ports(harness: Harness) {
    let first = harness.create("cache-a", "cache").await;
    let second = harness.create("cache-b", "cache").await;
    harness.manager.deploy(&first).await.expect("first deploy");
    harness.manager.undeploy(&first).await.expect("undeploy");

    let deployed = harness.manager.deploy(&second).await.expect("second deploy");

    assert_eq!(deployed.status(), DeploymentStatus::Running);
}
