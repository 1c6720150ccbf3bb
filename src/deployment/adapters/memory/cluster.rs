//! In-memory cluster API.

use crate::compiler::{ConfigObject, ExposureDescriptor, SecretObject, Workload};
use crate::deployment::{
    domain::{ClusterObjectKind, ClusterPortBinding, ExitInfo, ObservedState},
    ports::{BackendError, BackendResult, ClusterApi},
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

type ObjectKey = (String, String);

/// In-memory cluster API for one cluster context.
///
/// Applying into a namespace that does not exist is rejected. Node and
/// load-balancer ports are unique across the cluster.
#[derive(Debug, Clone, Default)]
pub struct InMemoryClusterApi {
    state: Arc<RwLock<ClusterState>>,
}

#[derive(Debug, Default)]
struct ClusterState {
    namespaces: BTreeSet<String>,
    configs: BTreeMap<ObjectKey, ConfigObject>,
    secrets: BTreeMap<ObjectKey, SecretObject>,
    workloads: BTreeMap<ObjectKey, Workload>,
    exposures: BTreeMap<ObjectKey, ExposureDescriptor>,
    stalled: BTreeSet<String>,
    crashed: BTreeMap<String, ExitInfo>,
}

fn lock_error(err: impl ToString) -> BackendError {
    BackendError::unavailable(std::io::Error::other(err.to_string()))
}

fn key(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_owned(), name.to_owned())
}

impl ClusterState {
    fn require_namespace(&self, namespace: &str) -> BackendResult<()> {
        if self.namespaces.contains(namespace) {
            Ok(())
        } else {
            Err(BackendError::rejected(format!(
                "namespace '{namespace}' not found"
            )))
        }
    }
}

impl InMemoryClusterApi {
    /// Creates an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps rollouts of the named workload from becoming ready.
    ///
    /// # Errors
    ///
    /// Returns backend errors when lock acquisition fails.
    pub fn stall(&self, workload: impl Into<String>) -> BackendResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.stalled.insert(workload.into());
        Ok(())
    }

    /// Makes the named workload report an exit.
    ///
    /// # Errors
    ///
    /// Returns backend errors when lock acquisition fails.
    pub fn crash(&self, workload: impl Into<String>, exit: ExitInfo) -> BackendResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.crashed.insert(workload.into(), exit);
        Ok(())
    }

    /// Returns the namespaces that exist, sorted.
    ///
    /// # Errors
    ///
    /// Returns backend errors when lock acquisition fails.
    pub fn namespaces(&self) -> BackendResult<Vec<String>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.namespaces.iter().cloned().collect())
    }

    /// Returns an applied config object.
    ///
    /// # Errors
    ///
    /// Returns backend errors when lock acquisition fails.
    pub fn config(&self, namespace: &str, name: &str) -> BackendResult<Option<ConfigObject>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.configs.get(&key(namespace, name)).cloned())
    }

    /// Returns an applied secret object.
    ///
    /// # Errors
    ///
    /// Returns backend errors when lock acquisition fails.
    pub fn secret(&self, namespace: &str, name: &str) -> BackendResult<Option<SecretObject>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.secrets.get(&key(namespace, name)).cloned())
    }

    /// Returns an applied workload.
    ///
    /// # Errors
    ///
    /// Returns backend errors when lock acquisition fails.
    pub fn workload(&self, namespace: &str, name: &str) -> BackendResult<Option<Workload>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.workloads.get(&key(namespace, name)).cloned())
    }

    /// Returns an applied exposure descriptor.
    ///
    /// # Errors
    ///
    /// Returns backend errors when lock acquisition fails.
    pub fn exposure(&self, namespace: &str, name: &str) -> BackendResult<Option<ExposureDescriptor>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.exposures.get(&key(namespace, name)).cloned())
    }
}

#[async_trait]
impl ClusterApi for InMemoryClusterApi {
    async fn ensure_namespace(&self, namespace: &str) -> BackendResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.namespaces.insert(namespace.to_owned());
        Ok(())
    }

    async fn apply_config(&self, namespace: &str, object: &ConfigObject) -> BackendResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.require_namespace(namespace)?;
        state
            .configs
            .insert(key(namespace, &object.name), object.clone());
        Ok(())
    }

    async fn apply_secret(&self, namespace: &str, object: &SecretObject) -> BackendResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.require_namespace(namespace)?;
        state
            .secrets
            .insert(key(namespace, &object.name), object.clone());
        Ok(())
    }

    async fn apply_workload(&self, namespace: &str, workload: &Workload) -> BackendResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.require_namespace(namespace)?;
        for source in &workload.env_from {
            let bound = state.configs.contains_key(&key(namespace, source))
                || state.secrets.contains_key(&key(namespace, source));
            if !bound {
                return Err(BackendError::rejected(format!(
                    "workload '{}' binds missing object '{source}'",
                    workload.name
                )));
            }
        }
        state
            .workloads
            .insert(key(namespace, &workload.name), workload.clone());
        Ok(())
    }

    async fn apply_exposure(
        &self,
        namespace: &str,
        exposure: &ExposureDescriptor,
    ) -> BackendResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.require_namespace(namespace)?;
        let own = key(namespace, &exposure.name);
        if exposure.mode.is_externally_addressable() {
            for port in &exposure.ports {
                let contested = state.exposures.iter().any(|(other, descriptor)| {
                    *other != own
                        && descriptor.mode.is_externally_addressable()
                        && descriptor.ports.iter().any(|used| used.port == port.port)
                });
                if contested {
                    return Err(BackendError::PortBindFailed {
                        port: port.port,
                        reason: "provided port is already allocated".to_owned(),
                    });
                }
            }
        }
        state.exposures.insert(own, exposure.clone());
        Ok(())
    }

    async fn rollout_status(&self, namespace: &str, workload: &str) -> BackendResult<ObservedState> {
        let state = self.state.read().map_err(lock_error)?;
        let Some(applied) = state.workloads.get(&key(namespace, workload)) else {
            return Ok(ObservedState::Missing);
        };
        if let Some(exit) = state.crashed.get(workload) {
            return Ok(ObservedState::Exited(exit.clone()));
        }
        let desired = applied.replicas;
        Ok(if state.stalled.contains(workload) {
            ObservedState::rollout(0, desired, "progressing")
        } else {
            ObservedState::rollout(desired, desired, "available")
        })
    }

    async fn delete(
        &self,
        namespace: &str,
        kind: ClusterObjectKind,
        name: &str,
    ) -> BackendResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        let object = key(namespace, name);
        match kind {
            ClusterObjectKind::Config => {
                state.configs.remove(&object);
            }
            ClusterObjectKind::Secret => {
                state.secrets.remove(&object);
            }
            ClusterObjectKind::Workload => {
                state.workloads.remove(&object);
            }
            ClusterObjectKind::Exposure => {
                state.exposures.remove(&object);
            }
        }
        Ok(())
    }

    async fn exposed_ports(&self) -> BackendResult<Vec<ClusterPortBinding>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .exposures
            .iter()
            .filter(|(_, descriptor)| descriptor.mode.is_externally_addressable())
            .flat_map(|((namespace, name), descriptor)| {
                descriptor.ports.iter().map(|port| ClusterPortBinding {
                    port: port.port,
                    namespace: namespace.clone(),
                    exposure: name.clone(),
                })
            })
            .collect())
    }
}
