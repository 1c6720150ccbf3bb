//! Container runtime port.

use super::BackendResult;
use crate::compiler::ContainerArtifact;
use crate::deployment::domain::{ContainerState, PublishedPort};
use async_trait::async_trait;

/// Single-host container runtime API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Creates a container without starting it and returns its id.
    async fn create(&self, spec: &ContainerArtifact) -> BackendResult<String>;

    /// Starts a created container, binding its published ports.
    async fn start(&self, container_id: &str) -> BackendResult<()>;

    /// Returns the state of a container, or `None` when it does not exist.
    async fn inspect(&self, container_id: &str) -> BackendResult<Option<ContainerState>>;

    /// Finds a container id by name.
    async fn find_by_name(&self, name: &str) -> BackendResult<Option<String>>;

    /// Force-removes a container. Removing a missing container succeeds.
    async fn remove(&self, container_id: &str) -> BackendResult<()>;

    /// Lists every host port bound by a running container.
    async fn list_by_port(&self) -> BackendResult<Vec<PublishedPort>>;
}
