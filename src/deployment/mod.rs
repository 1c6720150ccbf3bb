//! Deployment manager and backends.
//!
//! Drives each configuration through its lifecycle: resolve capabilities,
//! compile, preflight, submit with bounded retry, then confirm readiness.
//! Backends sit behind [`ports::DeploymentBackend`], one handle per port
//! space, created through a [`ports::BackendFactory`] and owned by
//! [`services::BackendRegistry`].
//!
//! - Observed state in [`domain`]
//! - Backend and runtime contracts in [`ports`]
//! - Container, cluster and in-memory implementations in [`adapters`]
//! - The manager and registry in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
