//! In-memory backend factory.

use super::{InMemoryClusterApi, InMemoryContainerRuntime};
use crate::configuration::domain::{DeploymentTarget, PortSpace};
use crate::deployment::{
    adapters::{ClusterBackend, ContainerBackend},
    ports::{BackendFactory, BackendResult, DeploymentBackend},
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Creates backends over in-memory runtimes, one per host and one cluster
/// per context.
///
/// Runtimes outlive the handles built on them, so a re-created handle sees
/// the same containers and objects.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackendFactory {
    runtimes: Arc<Mutex<BTreeMap<String, InMemoryContainerRuntime>>>,
    clusters: Arc<Mutex<BTreeMap<String, InMemoryClusterApi>>>,
    created: Arc<AtomicUsize>,
}

impl InMemoryBackendFactory {
    /// Creates a factory with no runtimes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the runtime of `host`, creating it on first use.
    #[must_use]
    pub fn container_runtime(&self, host: &str) -> InMemoryContainerRuntime {
        self.runtimes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(host.to_owned())
            .or_default()
            .clone()
    }

    /// Returns the cluster behind `context`, creating it on first use.
    #[must_use]
    pub fn cluster_api(&self, context: &str) -> InMemoryClusterApi {
        self.clusters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(context.to_owned())
            .or_default()
            .clone()
    }

    /// Returns how many backend handles this factory has created.
    #[must_use]
    pub fn handles_created(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }
}

impl BackendFactory for InMemoryBackendFactory {
    fn create(&self, target: &DeploymentTarget) -> BackendResult<Arc<dyn DeploymentBackend>> {
        self.created.fetch_add(1, Ordering::AcqRel);
        Ok(match target.port_space() {
            PortSpace::Host(host) => Arc::new(ContainerBackend::new(Arc::new(
                self.container_runtime(&host),
            ))),
            PortSpace::Cluster(context) => {
                Arc::new(ClusterBackend::new(Arc::new(self.cluster_api(&context))))
            }
        })
    }
}
