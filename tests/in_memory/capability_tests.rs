//! Capability wiring and fail-fast gating.

use crate::in_memory::helpers::{Harness, harness, id};
use deckhand::capability::services::CapabilityError;
use deckhand::configuration::domain::DeploymentStatus;
use deckhand::deployment::services::DeploymentError;
use rstest::rstest;

async fn provider(harness: &Harness, api_key: Option<&str>) {
    let llm = harness.create("llm-1", "llm").await;
    if let Some(key) = api_key {
        harness
            .manager
            .store()
            .apply_override(&llm, "LLM_API_KEY", key)
            .await
            .expect("provider key");
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unresolved_capability_fails_before_any_backend_call(harness: Harness) {
    let agent = harness.create("agent-1", "agent").await;

    let error = harness
        .manager
        .deploy(&agent)
        .await
        .expect_err("no llm provider is selected");

    assert!(matches!(
        error,
        DeploymentError::Capability(CapabilityError::UnresolvedCapability { ref capability, .. })
            if capability.as_str() == "llm"
    ));
    assert_eq!(harness.local().create_attempts().expect("count"), 0);
    let stored = harness.manager.store().get(&agent).await.expect("lookup");
    assert_eq!(stored.status(), DeploymentStatus::Pending);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn selected_provider_exports_reach_the_consumer_container(harness: Harness) {
    provider(&harness, Some("sk-test")).await;
    let agent = harness.create("agent-1", "agent").await;
    harness
        .manager
        .resolver()
        .select_provider("llm", &id("llm-1"))
        .await
        .expect("select");

    harness.manager.deploy(&agent).await.expect("deploy");

    let (spec, _) = harness
        .local()
        .container("agent-1")
        .expect("runtime")
        .expect("container exists");
    assert_eq!(
        spec.env.get("LLM_URL").map(String::as_str),
        Some("http://llm-1:8080")
    );
    assert_eq!(spec.env.get("LLM_API_KEY").map(String::as_str), Some("sk-test"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unconfigured_provider_blocks_the_consumer(harness: Harness) {
    provider(&harness, None).await;
    let agent = harness.create("agent-1", "agent").await;
    harness
        .manager
        .resolver()
        .select_provider("llm", &id("llm-1"))
        .await
        .expect("select");

    let error = harness
        .manager
        .deploy(&agent)
        .await
        .expect_err("provider lacks its key");

    assert!(matches!(
        error,
        DeploymentError::Capability(CapabilityError::ProviderNotConfigured { .. })
    ));
    assert_eq!(harness.local().create_attempts().expect("count"), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn removing_a_provider_releases_it_without_touching_consumers(harness: Harness) {
    provider(&harness, Some("sk-test")).await;
    let agent = harness.create("agent-1", "agent").await;
    harness
        .manager
        .resolver()
        .select_provider("llm", &id("llm-1"))
        .await
        .expect("select");
    harness.manager.deploy(&agent).await.expect("deploy");

    let released = harness.manager.remove(&id("llm-1")).await.expect("remove");

    assert_eq!(
        released.iter().map(|name| name.as_str()).collect::<Vec<_>>(),
        vec!["llm"]
    );
    let running = harness.manager.store().get(&agent).await.expect("lookup");
    assert_eq!(running.status(), DeploymentStatus::Running);
    assert!(harness
        .manager
        .resolver()
        .selections()
        .await
        .expect("selections")
        .is_empty());
}
