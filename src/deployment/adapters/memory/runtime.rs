//! In-memory container runtime.

use crate::compiler::{ContainerArtifact, PortMapping, RestartPolicy};
use crate::deployment::{
    domain::{ContainerState, ExitInfo, PublishedPort},
    ports::{BackendError, BackendResult, ContainerRuntime},
};
use crate::template::domain::PortProtocol;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// In-memory container runtime.
///
/// Models one host without running anything. Ports are bound at start,
/// so a second container publishing the same host port fails to start.
/// Failure injection hooks drive crash, rejection, stall and rate-limit
/// paths in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContainerRuntime {
    state: Arc<RwLock<RuntimeState>>,
}

#[derive(Debug, Default)]
struct RuntimeState {
    containers: BTreeMap<String, StoredContainer>,
    crash_on_start: BTreeMap<String, ExitInfo>,
    stalled: BTreeSet<String>,
    rejected: BTreeMap<String, String>,
    rate_limited_creates: u32,
    create_attempts: u32,
}

#[derive(Debug, Clone)]
struct StoredContainer {
    spec: ContainerArtifact,
    state: ContainerState,
}

fn lock_error(err: impl ToString) -> BackendError {
    BackendError::unavailable(std::io::Error::other(err.to_string()))
}

impl RuntimeState {
    fn holder_of(&self, port: u16, except: &str) -> Option<&str> {
        self.containers
            .iter()
            .filter(|(id, container)| {
                id.as_str() != except && container.state == ContainerState::Running
            })
            .find(|(_, container)| {
                container
                    .spec
                    .ports
                    .iter()
                    .any(|mapping| mapping.host_port == port)
            })
            .map(|(_, container)| container.spec.name.as_str())
    }
}

impl InMemoryContainerRuntime {
    /// Creates an empty runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a container the engine does not manage, holding `port`.
    ///
    /// # Errors
    ///
    /// Returns backend errors when lock acquisition fails.
    pub fn occupy(&self, port: u16, holder: impl Into<String>) -> BackendResult<String> {
        let mut state = self.state.write().map_err(lock_error)?;
        let name = holder.into();
        let id = Uuid::new_v4().simple().to_string();
        state.containers.insert(
            id.clone(),
            StoredContainer {
                spec: ContainerArtifact {
                    name: name.clone(),
                    image: format!("external/{name}"),
                    env: BTreeMap::new(),
                    ports: vec![PortMapping {
                        host_port: port,
                        container_port: port,
                        protocol: PortProtocol::Tcp,
                    }],
                    volumes: Vec::new(),
                    restart_policy: RestartPolicy::No,
                    labels: BTreeMap::new(),
                },
                state: ContainerState::Running,
            },
        );
        Ok(id)
    }

    /// Makes the named container exit right after it starts.
    ///
    /// # Errors
    ///
    /// Returns backend errors when lock acquisition fails.
    pub fn crash_on_start(&self, name: impl Into<String>, exit: ExitInfo) -> BackendResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.crash_on_start.insert(name.into(), exit);
        Ok(())
    }

    /// Keeps the named container in the created state after start.
    ///
    /// # Errors
    ///
    /// Returns backend errors when lock acquisition fails.
    pub fn stall(&self, name: impl Into<String>) -> BackendResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.stalled.insert(name.into());
        Ok(())
    }

    /// Makes creation of the named container fail with a rejection.
    ///
    /// # Errors
    ///
    /// Returns backend errors when lock acquisition fails.
    pub fn reject(&self, name: impl Into<String>, reason: impl Into<String>) -> BackendResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.rejected.insert(name.into(), reason.into());
        Ok(())
    }

    /// Rate-limits the next `count` create calls.
    ///
    /// # Errors
    ///
    /// Returns backend errors when lock acquisition fails.
    pub fn rate_limit_creates(&self, count: u32) -> BackendResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.rate_limited_creates = count;
        Ok(())
    }

    /// Makes a running container exit. Returns whether one did.
    ///
    /// # Errors
    ///
    /// Returns backend errors when lock acquisition fails.
    pub fn crash(&self, name: &str, exit: ExitInfo) -> BackendResult<bool> {
        let mut state = self.state.write().map_err(lock_error)?;
        let crashed = state
            .containers
            .values_mut()
            .find(|container| {
                container.spec.name == name && container.state == ContainerState::Running
            })
            .map(|container| container.state = ContainerState::Exited(exit))
            .is_some();
        Ok(crashed)
    }

    /// Returns the spec and state of the named container.
    ///
    /// # Errors
    ///
    /// Returns backend errors when lock acquisition fails.
    pub fn container(&self, name: &str) -> BackendResult<Option<(ContainerArtifact, ContainerState)>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .containers
            .values()
            .find(|container| container.spec.name == name)
            .map(|container| (container.spec.clone(), container.state.clone())))
    }

    /// Returns the names of running containers, sorted.
    ///
    /// # Errors
    ///
    /// Returns backend errors when lock acquisition fails.
    pub fn running(&self) -> BackendResult<Vec<String>> {
        let state = self.state.read().map_err(lock_error)?;
        let mut names: Vec<String> = state
            .containers
            .values()
            .filter(|container| container.state == ContainerState::Running)
            .map(|container| container.spec.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Returns how many create calls were made, including failed ones.
    ///
    /// # Errors
    ///
    /// Returns backend errors when lock acquisition fails.
    pub fn create_attempts(&self) -> BackendResult<u32> {
        Ok(self.state.read().map_err(lock_error)?.create_attempts)
    }
}

#[async_trait]
impl ContainerRuntime for InMemoryContainerRuntime {
    async fn create(&self, spec: &ContainerArtifact) -> BackendResult<String> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.create_attempts += 1;
        if state.rate_limited_creates > 0 {
            state.rate_limited_creates -= 1;
            return Err(BackendError::RateLimited {
                reason: "too many requests".to_owned(),
            });
        }
        if let Some(reason) = state.rejected.get(&spec.name) {
            return Err(BackendError::rejected(reason.clone()));
        }
        if state
            .containers
            .values()
            .any(|container| container.spec.name == spec.name)
        {
            return Err(BackendError::rejected(format!(
                "container name '{}' is already in use",
                spec.name
            )));
        }

        let id = Uuid::new_v4().simple().to_string();
        state.containers.insert(
            id.clone(),
            StoredContainer {
                spec: spec.clone(),
                state: ContainerState::Created,
            },
        );
        Ok(id)
    }

    async fn start(&self, container_id: &str) -> BackendResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        let spec = state
            .containers
            .get(container_id)
            .map(|container| container.spec.clone())
            .ok_or_else(|| BackendError::rejected(format!("no such container: {container_id}")))?;

        for mapping in &spec.ports {
            if let Some(holder) = state.holder_of(mapping.host_port, container_id) {
                return Err(BackendError::PortBindFailed {
                    port: mapping.host_port,
                    reason: format!("port is already allocated by {holder}"),
                });
            }
        }

        let next = if let Some(exit) = state.crash_on_start.get(&spec.name) {
            ContainerState::Exited(exit.clone())
        } else if state.stalled.contains(&spec.name) {
            ContainerState::Created
        } else {
            ContainerState::Running
        };
        if let Some(container) = state.containers.get_mut(container_id) {
            container.state = next;
        }
        Ok(())
    }

    async fn inspect(&self, container_id: &str) -> BackendResult<Option<ContainerState>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .containers
            .get(container_id)
            .map(|container| container.state.clone()))
    }

    async fn find_by_name(&self, name: &str) -> BackendResult<Option<String>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .containers
            .iter()
            .find(|(_, container)| container.spec.name == name)
            .map(|(id, _)| id.clone()))
    }

    async fn remove(&self, container_id: &str) -> BackendResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.containers.remove(container_id);
        Ok(())
    }

    async fn list_by_port(&self) -> BackendResult<Vec<PublishedPort>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .containers
            .iter()
            .filter(|(_, container)| container.state == ContainerState::Running)
            .flat_map(|(id, container)| {
                container.spec.ports.iter().map(|mapping| PublishedPort {
                    port: mapping.host_port,
                    container_id: id.clone(),
                    container_name: container.spec.name.clone(),
                })
            })
            .collect())
    }
}
