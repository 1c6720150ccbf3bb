//! In-memory deployment integration tests.
//!
//! Tests are organized into modules by functionality:
//! - `lifecycle_tests`: Deploy, redeploy, undeploy and remove
//! - `port_tests`: Preflight conflicts and remediation
//! - `capability_tests`: Provider wiring and fail-fast gating
//! - `failure_tests`: Retries, rejections, timeouts and crashes
//! - `cluster_tests`: Cluster object sets and retargeting
//! - `concurrency_tests`: Per-configuration operation guards

mod in_memory {
    pub mod helpers;

    mod capability_tests;
    mod cluster_tests;
    mod concurrency_tests;
    mod failure_tests;
    mod lifecycle_tests;
    mod port_tests;
}
