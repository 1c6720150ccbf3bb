//! Behaviour tests for the end-to-end cache deployment flow.

mod cache_deployment_steps;

use cache_deployment_steps::world::{CacheWorld, world};
use rstest_bdd_macros::scenario;

#[scenario(
    path = "tests/features/cache_deployment.feature",
    name = "Second cache instance is remediated onto the suggested port"
)]
#[tokio::test(flavor = "multi_thread")]
async fn second_instance_remediated(world: CacheWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/cache_deployment.feature",
    name = "Unset placeholder blocks the deploy before the runtime is touched"
)]
#[tokio::test(flavor = "multi_thread")]
async fn unset_placeholder_blocks_deploy(world: CacheWorld) {
    let _ = world;
}
