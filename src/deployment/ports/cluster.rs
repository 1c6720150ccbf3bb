//! Cluster API port.

use super::BackendResult;
use crate::compiler::{ConfigObject, ExposureDescriptor, SecretObject, Workload};
use crate::deployment::domain::{ClusterObjectKind, ClusterPortBinding, ObservedState};
use async_trait::async_trait;

/// Cluster orchestrator API for one cluster context.
///
/// Every `apply_*` call creates the object or replaces an existing one of
/// the same name.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Creates the namespace when it does not exist.
    async fn ensure_namespace(&self, namespace: &str) -> BackendResult<()>;

    /// Applies a config object.
    async fn apply_config(&self, namespace: &str, object: &ConfigObject) -> BackendResult<()>;

    /// Applies a secret object.
    async fn apply_secret(&self, namespace: &str, object: &SecretObject) -> BackendResult<()>;

    /// Applies a workload and starts its rollout.
    async fn apply_workload(&self, namespace: &str, workload: &Workload) -> BackendResult<()>;

    /// Applies an exposure descriptor.
    async fn apply_exposure(
        &self,
        namespace: &str,
        exposure: &ExposureDescriptor,
    ) -> BackendResult<()>;

    /// Reports the rollout state of a workload.
    async fn rollout_status(&self, namespace: &str, workload: &str) -> BackendResult<ObservedState>;

    /// Deletes an object. Deleting a missing object succeeds.
    async fn delete(&self, namespace: &str, kind: ClusterObjectKind, name: &str)
    -> BackendResult<()>;

    /// Lists node and load-balancer ports exposed across the cluster.
    async fn exposed_ports(&self) -> BackendResult<Vec<ClusterPortBinding>>;
}
