//! Deployment backend over a single-host container runtime.

use crate::allocation::domain::PortBinding;
use crate::compiler::{Artifact, ContainerArtifact};
use crate::configuration::domain::{BackendKind, RuntimeRefs};
use crate::deployment::{
    domain::ObservedState,
    ports::{BackendError, BackendResult, ContainerRuntime, DeploymentBackend},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs container artifacts on one host.
#[derive(Debug)]
pub struct ContainerBackend<R: ContainerRuntime> {
    runtime: Arc<R>,
}

impl<R: ContainerRuntime> Clone for ContainerBackend<R> {
    fn clone(&self) -> Self {
        Self {
            runtime: Arc::clone(&self.runtime),
        }
    }
}

impl<R: ContainerRuntime> ContainerBackend<R> {
    /// Creates a backend over `runtime`.
    #[must_use]
    pub const fn new(runtime: Arc<R>) -> Self {
        Self { runtime }
    }

    fn container(artifact: &Artifact) -> BackendResult<&ContainerArtifact> {
        match artifact {
            Artifact::Container(container) => Ok(container),
            Artifact::Cluster(_) => Err(BackendError::KindMismatch {
                backend: BackendKind::Container,
                artifact: artifact.kind(),
            }),
        }
    }

    fn container_id(refs: &RuntimeRefs) -> BackendResult<&str> {
        match refs {
            RuntimeRefs::Container { container_id, .. } => Ok(container_id),
            RuntimeRefs::Cluster { .. } => Err(BackendError::ForeignRefs {
                backend: BackendKind::Container,
                refs: refs.clone(),
            }),
        }
    }
}

#[async_trait]
impl<R: ContainerRuntime> DeploymentBackend for ContainerBackend<R> {
    fn kind(&self) -> BackendKind {
        BackendKind::Container
    }

    async fn submit(&self, artifact: &Artifact) -> BackendResult<RuntimeRefs> {
        let spec = Self::container(artifact)?;

        // A leftover container of the same name blocks creation.
        if let Some(stale) = self.runtime.find_by_name(&spec.name).await? {
            debug!(container = %spec.name, container_id = %stale, "removing stale container");
            self.runtime.remove(&stale).await?;
        }

        let container_id = self.runtime.create(spec).await?;
        if let Err(error) = self.runtime.start(&container_id).await {
            if let Err(cleanup) = self.runtime.remove(&container_id).await {
                warn!(
                    container_id = %container_id,
                    error = %cleanup,
                    "failed to remove container after start failure"
                );
            }
            return Err(error);
        }
        Ok(RuntimeRefs::Container {
            container_id,
            name: spec.name.clone(),
        })
    }

    async fn update(&self, refs: &RuntimeRefs, artifact: &Artifact) -> BackendResult<RuntimeRefs> {
        Self::container(artifact)?;
        self.runtime.remove(Self::container_id(refs)?).await?;
        self.submit(artifact).await
    }

    async fn status(&self, refs: &RuntimeRefs) -> BackendResult<ObservedState> {
        Ok(self
            .runtime
            .inspect(Self::container_id(refs)?)
            .await?
            .map_or(ObservedState::Missing, ObservedState::from))
    }

    async fn teardown(&self, refs: &RuntimeRefs) -> BackendResult<()> {
        self.runtime.remove(Self::container_id(refs)?).await
    }

    async fn bound_ports(&self) -> BackendResult<Vec<PortBinding>> {
        Ok(self
            .runtime
            .list_by_port()
            .await?
            .into_iter()
            .map(|published| {
                PortBinding::external(published.port, format!("container {}", published.container_name))
                    .with_refs(RuntimeRefs::Container {
                        container_id: published.container_id,
                        name: published.container_name,
                    })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{
        ClusterArtifactSet, ConfigObject, PortMapping, RestartPolicy, SecretObject, Workload,
    };
    use crate::deployment::adapters::memory::InMemoryContainerRuntime;
    use crate::deployment::ports::MockContainerRuntime;
    use crate::template::domain::PortProtocol;
    use rstest::{fixture, rstest};
    use std::collections::BTreeMap;

    #[fixture]
    fn runtime() -> Arc<InMemoryContainerRuntime> {
        Arc::new(InMemoryContainerRuntime::new())
    }

    fn cache(port: u16) -> Artifact {
        Artifact::Container(ContainerArtifact {
            name: "cache-a".to_owned(),
            image: "registry/cache:latest".to_owned(),
            env: BTreeMap::new(),
            ports: vec![PortMapping {
                host_port: port,
                container_port: 6379,
                protocol: PortProtocol::Tcp,
            }],
            volumes: Vec::new(),
            restart_policy: RestartPolicy::UnlessStopped,
            labels: BTreeMap::new(),
        })
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn failed_start_leaves_no_container_behind(runtime: Arc<InMemoryContainerRuntime>) {
        runtime.occupy(6379, "legacy-cache").expect("occupy");
        let backend = ContainerBackend::new(Arc::clone(&runtime));

        let error = backend.submit(&cache(6379)).await.expect_err("port is taken");

        assert!(matches!(error, BackendError::PortBindFailed { port: 6379, .. }));
        assert!(runtime.container("cache-a").expect("runtime").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_cleanup_keeps_the_start_error() {
        let mut runtime = MockContainerRuntime::new();
        runtime.expect_find_by_name().returning(|_| Ok(None));
        runtime
            .expect_create()
            .times(1)
            .returning(|_| Ok("container-1".to_owned()));
        runtime.expect_start().times(1).returning(|_| {
            Err(BackendError::PortBindFailed {
                port: 6379,
                reason: "port is already allocated".to_owned(),
            })
        });
        runtime
            .expect_remove()
            .times(1)
            .returning(|_| Err(BackendError::rejected("device or resource busy")));
        let backend = ContainerBackend::new(Arc::new(runtime));

        let error = backend.submit(&cache(6379)).await.expect_err("start fails");

        assert!(matches!(error, BackendError::PortBindFailed { port: 6379, .. }));
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn update_replaces_the_previous_container(runtime: Arc<InMemoryContainerRuntime>) {
        let backend = ContainerBackend::new(Arc::clone(&runtime));
        let first = backend.submit(&cache(6379)).await.expect("submit");

        let second = backend
            .update(&first, &cache(6380))
            .await
            .expect("update");

        assert_ne!(first, second);
        assert_eq!(runtime.running().expect("running"), vec!["cache-a"]);
        let bound: Vec<u16> = backend
            .bound_ports()
            .await
            .expect("bindings")
            .iter()
            .map(|binding| binding.port)
            .collect();
        assert_eq!(bound, vec![6380]);
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn cluster_artifacts_and_refs_are_refused(runtime: Arc<InMemoryContainerRuntime>) {
        let backend = ContainerBackend::new(runtime);
        let set = Artifact::Cluster(ClusterArtifactSet {
            namespace: "default".to_owned(),
            config_object: ConfigObject {
                name: "cache-a-config".to_owned(),
                data: BTreeMap::new(),
            },
            secret_object: SecretObject {
                name: "cache-a-secrets".to_owned(),
                data: BTreeMap::new(),
            },
            workload: Workload {
                name: "cache-a".to_owned(),
                image: "registry/cache:latest".to_owned(),
                replicas: 1,
                labels: BTreeMap::new(),
                env_from: Vec::new(),
                ports: Vec::new(),
                probe: None,
                volumes: Vec::new(),
            },
            exposure: None,
        });
        let refs = RuntimeRefs::Cluster {
            namespace: "default".to_owned(),
            config_object: "cache-a-config".to_owned(),
            secret_object: "cache-a-secrets".to_owned(),
            workload: "cache-a".to_owned(),
            exposure: None,
        };

        assert!(matches!(
            backend.submit(&set).await,
            Err(BackendError::KindMismatch { .. })
        ));
        assert!(matches!(
            backend.status(&refs).await,
            Err(BackendError::ForeignRefs { .. })
        ));
    }
}
