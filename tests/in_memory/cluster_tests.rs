//! Cluster object sets, exposure conflicts and retargeting.

use crate::in_memory::helpers::{Harness, cache_template, harness, harness_with, id};
use deckhand::allocation::domain::PortHolder;
use deckhand::configuration::domain::{DeploymentStatus, DeploymentTarget, FailureKind};
use deckhand::deployment::{
    domain::ExitInfo,
    ports::{BackendError, ClusterApi},
    services::DeploymentError,
};
use deckhand::compiler::{ExposedPort, ExposureDescriptor};
use deckhand::template::{
    adapters::StaticEnvironment,
    domain::{ExposureMode, PortDeclaration, PortProtocol, ServiceTemplate, TemplateId},
};
use rstest::rstest;
use std::collections::BTreeMap;

fn staging(namespace: &str) -> DeploymentTarget {
    DeploymentTarget::cluster("staging", namespace).expect("valid target")
}

fn edge_template() -> ServiceTemplate {
    ServiceTemplate::new(
        TemplateId::new("edge-cache").expect("valid id"),
        "registry/cache:latest",
    )
    .expect("valid template")
    .with_port(PortDeclaration::new("6379", 6379))
    .with_health_check("/healthz")
    .with_exposure(ExposureMode::NodePort)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cluster_deploy_applies_the_object_set(harness: Harness) {
    let cache = harness
        .create_on("cache-a", "cache", staging("Team A"))
        .await;
    harness
        .manager
        .store()
        .apply_override(&cache, "CACHE_PASSWORD", "hunter2")
        .await
        .expect("override");

    let deployed = harness.manager.deploy(&cache).await.expect("deploy");

    assert_eq!(deployed.status(), DeploymentStatus::Running);
    let cluster = harness.cluster("staging");
    assert_eq!(cluster.namespaces().expect("namespaces"), vec!["team-a"]);
    let config = cluster
        .config("team-a", "cache-a-config")
        .expect("cluster")
        .expect("config object");
    let secret = cluster
        .secret("team-a", "cache-a-secrets")
        .expect("cluster")
        .expect("secret object");
    assert_eq!(
        config.data.get("CACHE_MAXMEMORY").map(String::as_str),
        Some("256mb")
    );
    assert!(!config.data.contains_key("CACHE_PASSWORD"));
    assert_eq!(
        secret.data.get("CACHE_PASSWORD").map(String::as_str),
        Some("hunter2")
    );
    let workload = cluster
        .workload("team-a", "cache-a")
        .expect("cluster")
        .expect("workload");
    assert_eq!(workload.replicas, 1);
    assert_eq!(workload.env_from, vec!["cache-a-config", "cache-a-secrets"]);
    assert!(
        deployed
            .record()
            .is_some_and(|record| record.bound_ports.is_empty())
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stalled_rollouts_time_out_with_their_last_condition(harness: Harness) {
    harness.cluster("staging").stall("cache-a").expect("inject");
    let cache = harness.create_on("cache-a", "cache", staging("team-a")).await;

    let error = harness.manager.deploy(&cache).await.expect_err("stalled");

    assert!(matches!(
        error,
        DeploymentError::BackendTimeout { ref last_condition, .. }
            if last_condition == "progressing: 0/1 replicas ready"
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn crashed_workloads_are_detected_on_refresh(harness: Harness) {
    let cache = harness.create_on("cache-a", "cache", staging("team-a")).await;
    harness.manager.deploy(&cache).await.expect("deploy");
    harness
        .cluster("staging")
        .crash("cache-a", ExitInfo::new(Some(2), "CrashLoopBackOff"))
        .expect("inject");

    let refreshed = harness.manager.refresh_status(&cache).await.expect("refresh");

    assert_eq!(
        refreshed.last_failure().map(|failure| failure.kind),
        Some(FailureKind::RuntimeCrash)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn externally_addressable_ports_conflict_across_namespaces() {
    let harness = harness_with(vec![edge_template()], StaticEnvironment::new());
    let first = harness
        .create_on("edge-a", "edge-cache", staging("team-a"))
        .await;
    let second = harness
        .create_on("edge-b", "edge-cache", staging("team-b"))
        .await;
    let deployed = harness.manager.deploy(&first).await.expect("first deploy");
    assert_eq!(
        deployed.record().map(|record| record.bound_ports.clone()),
        Some(vec![6379])
    );

    let report = harness.manager.preflight(&second).await.expect("preflight");

    assert!(!report.can_start);
    let conflict = report.conflicts.first().expect("one conflict");
    assert_eq!(conflict.used_by, PortHolder::Configuration(id("edge-a")));
    assert_eq!(conflict.suggested_port, Some(6380));
    let probe = harness
        .cluster("staging")
        .workload("team-a", "edge-a")
        .expect("cluster")
        .and_then(|workload| workload.probe)
        .expect("health probe");
    assert_eq!(probe.path, "/healthz");
    assert_eq!(probe.port, 6379);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn exposures_cannot_share_an_addressable_port() {
    let harness = harness_with(vec![cache_template()], StaticEnvironment::new());
    let cluster = harness.cluster("staging");
    let exposure = |name: &str| ExposureDescriptor {
        name: name.to_owned(),
        mode: ExposureMode::LoadBalancer,
        selector: BTreeMap::new(),
        ports: vec![ExposedPort {
            name: "http".to_owned(),
            port: 8443,
            target_port: 8443,
            protocol: PortProtocol::Tcp,
        }],
    };
    cluster.ensure_namespace("team-a").await.expect("namespace");
    cluster
        .apply_exposure("team-a", &exposure("gateway-a"))
        .await
        .expect("first exposure");

    let error = cluster
        .apply_exposure("team-a", &exposure("gateway-b"))
        .await
        .expect_err("port is taken");

    assert!(matches!(error, BackendError::PortBindFailed { port: 8443, .. }));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn retargeting_moves_the_deployment(harness: Harness) {
    let cache = harness.create("cache-a", "cache").await;
    harness.manager.deploy(&cache).await.expect("local deploy");
    harness
        .manager
        .store()
        .retarget(&cache, staging("team-a"))
        .await
        .expect("retarget");

    let moved = harness.manager.deploy(&cache).await.expect("cluster deploy");

    assert_eq!(moved.status(), DeploymentStatus::Running);
    assert_eq!(
        moved.record().map(|record| &record.target),
        Some(&staging("team-a"))
    );
    assert!(harness.local().container("cache-a").expect("runtime").is_none());
    assert!(
        harness
            .cluster("staging")
            .workload("team-a", "cache-a")
            .expect("cluster")
            .is_some()
    );
}
