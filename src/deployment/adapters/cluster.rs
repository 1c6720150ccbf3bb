//! Deployment backend over a cluster API.

use crate::allocation::domain::PortBinding;
use crate::compiler::{Artifact, ClusterArtifactSet};
use crate::configuration::domain::{BackendKind, RuntimeRefs};
use crate::deployment::{
    domain::{ClusterObjectKind, ObservedState},
    ports::{BackendError, BackendResult, ClusterApi, DeploymentBackend},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Runs cluster artifact sets in one cluster context.
///
/// The namespace is created on demand before any object is applied. Objects
/// are applied config first and exposure last, and deleted in reverse.
#[derive(Debug)]
pub struct ClusterBackend<C: ClusterApi> {
    api: Arc<C>,
}

impl<C: ClusterApi> Clone for ClusterBackend<C> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
        }
    }
}

struct ClusterRefs<'a> {
    namespace: &'a str,
    config_object: &'a str,
    secret_object: &'a str,
    workload: &'a str,
    exposure: Option<&'a str>,
}

impl<C: ClusterApi> ClusterBackend<C> {
    /// Creates a backend over `api`.
    #[must_use]
    pub const fn new(api: Arc<C>) -> Self {
        Self { api }
    }

    fn artifact_set(artifact: &Artifact) -> BackendResult<&ClusterArtifactSet> {
        match artifact {
            Artifact::Cluster(set) => Ok(set),
            Artifact::Container(_) => Err(BackendError::KindMismatch {
                backend: BackendKind::Cluster,
                artifact: artifact.kind(),
            }),
        }
    }

    fn refs(refs: &RuntimeRefs) -> BackendResult<ClusterRefs<'_>> {
        match refs {
            RuntimeRefs::Cluster {
                namespace,
                config_object,
                secret_object,
                workload,
                exposure,
            } => Ok(ClusterRefs {
                namespace,
                config_object,
                secret_object,
                workload,
                exposure: exposure.as_deref(),
            }),
            RuntimeRefs::Container { .. } => Err(BackendError::ForeignRefs {
                backend: BackendKind::Cluster,
                refs: refs.clone(),
            }),
        }
    }

    fn refs_of(set: &ClusterArtifactSet) -> RuntimeRefs {
        RuntimeRefs::Cluster {
            namespace: set.namespace.clone(),
            config_object: set.config_object.name.clone(),
            secret_object: set.secret_object.name.clone(),
            workload: set.workload.name.clone(),
            exposure: set.exposure.as_ref().map(|exposure| exposure.name.clone()),
        }
    }

    async fn apply(&self, set: &ClusterArtifactSet) -> BackendResult<RuntimeRefs> {
        let namespace = set.namespace.as_str();
        self.api.ensure_namespace(namespace).await?;
        self.api.apply_config(namespace, &set.config_object).await?;
        self.api.apply_secret(namespace, &set.secret_object).await?;
        self.api.apply_workload(namespace, &set.workload).await?;
        if let Some(exposure) = &set.exposure {
            self.api.apply_exposure(namespace, exposure).await?;
        }
        Ok(Self::refs_of(set))
    }

    async fn delete_all(&self, refs: &ClusterRefs<'_>) -> BackendResult<()> {
        if let Some(exposure) = refs.exposure {
            self.api
                .delete(refs.namespace, ClusterObjectKind::Exposure, exposure)
                .await?;
        }
        self.api
            .delete(refs.namespace, ClusterObjectKind::Workload, refs.workload)
            .await?;
        self.api
            .delete(refs.namespace, ClusterObjectKind::Secret, refs.secret_object)
            .await?;
        self.api
            .delete(refs.namespace, ClusterObjectKind::Config, refs.config_object)
            .await
    }
}

#[async_trait]
impl<C: ClusterApi> DeploymentBackend for ClusterBackend<C> {
    fn kind(&self) -> BackendKind {
        BackendKind::Cluster
    }

    async fn submit(&self, artifact: &Artifact) -> BackendResult<RuntimeRefs> {
        self.apply(Self::artifact_set(artifact)?).await
    }

    async fn update(&self, refs: &RuntimeRefs, artifact: &Artifact) -> BackendResult<RuntimeRefs> {
        let set = Self::artifact_set(artifact)?;
        let previous = Self::refs(refs)?;
        if previous.namespace != set.namespace {
            debug!(
                from = previous.namespace,
                to = %set.namespace,
                "namespace changed; replacing objects"
            );
            self.delete_all(&previous).await?;
        } else if let Some(exposure) = previous.exposure
            && set.exposure.is_none()
        {
            self.api
                .delete(previous.namespace, ClusterObjectKind::Exposure, exposure)
                .await?;
        }
        self.apply(set).await
    }

    async fn status(&self, refs: &RuntimeRefs) -> BackendResult<ObservedState> {
        let cluster = Self::refs(refs)?;
        self.api
            .rollout_status(cluster.namespace, cluster.workload)
            .await
    }

    async fn teardown(&self, refs: &RuntimeRefs) -> BackendResult<()> {
        self.delete_all(&Self::refs(refs)?).await
    }

    async fn bound_ports(&self) -> BackendResult<Vec<PortBinding>> {
        // Object names follow the compiler's convention, so the exposure
        // name identifies the whole set.
        Ok(self
            .api
            .exposed_ports()
            .await?
            .into_iter()
            .map(|binding| {
                let holder = format!("{}/{}", binding.namespace, binding.exposure);
                let refs = RuntimeRefs::Cluster {
                    config_object: format!("{}-config", binding.exposure),
                    secret_object: format!("{}-secrets", binding.exposure),
                    workload: binding.exposure.clone(),
                    exposure: Some(binding.exposure),
                    namespace: binding.namespace,
                };
                PortBinding::external(binding.port, holder).with_refs(refs)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{ConfigObject, ExposedPort, ExposureDescriptor, SecretObject, Workload};
    use crate::deployment::adapters::memory::InMemoryClusterApi;
    use crate::template::domain::{ExposureMode, PortProtocol};
    use rstest::{fixture, rstest};
    use std::collections::BTreeMap;

    #[fixture]
    fn api() -> Arc<InMemoryClusterApi> {
        Arc::new(InMemoryClusterApi::new())
    }

    fn set(namespace: &str, exposed: bool) -> Artifact {
        Artifact::Cluster(ClusterArtifactSet {
            namespace: namespace.to_owned(),
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
                env_from: vec!["cache-a-config".to_owned(), "cache-a-secrets".to_owned()],
                ports: Vec::new(),
                probe: None,
                volumes: Vec::new(),
            },
            exposure: exposed.then(|| ExposureDescriptor {
                name: "cache-a".to_owned(),
                mode: ExposureMode::NodePort,
                selector: BTreeMap::new(),
                ports: vec![ExposedPort {
                    name: "http".to_owned(),
                    port: 30_079,
                    target_port: 6379,
                    protocol: PortProtocol::Tcp,
                }],
            }),
        })
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn bound_port_refs_match_submitted_refs(api: Arc<InMemoryClusterApi>) {
        let backend = ClusterBackend::new(api);
        let refs = backend.submit(&set("team-a", true)).await.expect("submit");

        let bindings = backend.bound_ports().await.expect("bindings");

        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings.first().map(|binding| binding.port), Some(30_079));
        assert_eq!(
            bindings.first().and_then(|binding| binding.refs.as_ref()),
            Some(&refs)
        );
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn namespace_change_removes_the_old_objects(api: Arc<InMemoryClusterApi>) {
        let backend = ClusterBackend::new(Arc::clone(&api));
        let refs = backend.submit(&set("team-a", true)).await.expect("submit");

        backend
            .update(&refs, &set("team-b", true))
            .await
            .expect("update");

        assert!(api.workload("team-a", "cache-a").expect("cluster").is_none());
        assert!(api.exposure("team-a", "cache-a").expect("cluster").is_none());
        assert!(api.workload("team-b", "cache-a").expect("cluster").is_some());
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn dropped_exposure_is_deleted_on_update(api: Arc<InMemoryClusterApi>) {
        let backend = ClusterBackend::new(Arc::clone(&api));
        let refs = backend.submit(&set("team-a", true)).await.expect("submit");

        let updated = backend
            .update(&refs, &set("team-a", false))
            .await
            .expect("update");

        assert!(api.exposure("team-a", "cache-a").expect("cluster").is_none());
        assert!(matches!(updated, RuntimeRefs::Cluster { exposure: None, .. }));
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn teardown_removes_every_object(api: Arc<InMemoryClusterApi>) {
        let backend = ClusterBackend::new(Arc::clone(&api));
        let refs = backend.submit(&set("team-a", true)).await.expect("submit");

        backend.teardown(&refs).await.expect("teardown");

        assert!(api.config("team-a", "cache-a-config").expect("cluster").is_none());
        assert!(api.secret("team-a", "cache-a-secrets").expect("cluster").is_none());
        assert_eq!(
            backend.status(&refs).await.expect("status"),
            ObservedState::Missing
        );
    }
}
