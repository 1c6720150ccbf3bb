//! Port allocator and conflict resolver.

use crate::allocation::{
    domain::{PortConflict, PortHolder, PreflightReport, suggest_port},
    ports::{LiveBindingsError, LivePortBindings},
};
use crate::configuration::{
    domain::{BackendKind, ConfigurationId, ServiceConfiguration},
    ports::ConfigurationRepository,
    services::{ConfigurationStore, ConfigurationStoreError},
};
use crate::settings::EngineSettings;
use crate::template::{
    domain::{HostPortError, ServiceTemplate},
    ports::EnvironmentSource,
};
use mockable::Clock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors returned by preflight checks.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// Configuration lookup or interpolation failed.
    #[error(transparent)]
    Store(#[from] ConfigurationStoreError),

    /// Live bindings could not be observed.
    #[error(transparent)]
    Bindings(#[from] LiveBindingsError),

    /// A host port expression does not resolve to a port number.
    #[error("configuration {configuration_id} port {env_var}: {source}")]
    InvalidHostPort {
        /// Configuration identifier.
        configuration_id: ConfigurationId,
        /// Override key of the declaration.
        env_var: String,
        /// Resolution failure.
        source: HostPortError,
    },
}

/// Result type for allocation operations.
pub type AllocationResult<T> = Result<T, AllocationError>;

/// A host port a configuration intends to bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortClaim {
    /// Host port.
    pub host_port: u16,
    /// Container-side port.
    pub container_port: u16,
    /// Override key that carries the host port.
    pub env_var: String,
}

/// Computes the host ports a configuration would bind.
///
/// Cluster targets with internal exposure bind nothing on the host side.
///
/// # Errors
///
/// Returns [`AllocationError::InvalidHostPort`] when an expression does not
/// resolve to a port number.
pub fn claimed_ports(
    configuration: &ServiceConfiguration,
    template: &ServiceTemplate,
    env: &BTreeMap<String, String>,
    ambient: &BTreeMap<String, String>,
) -> AllocationResult<Vec<PortClaim>> {
    if configuration.target().backend_kind() == BackendKind::Cluster
        && !template.exposure().is_externally_addressable()
    {
        return Ok(Vec::new());
    }

    template
        .ports()
        .iter()
        .map(|declaration| {
            let host_port = declaration.resolve_host_port(env, ambient).map_err(|source| {
                AllocationError::InvalidHostPort {
                    configuration_id: configuration.id().clone(),
                    env_var: declaration.env_var().to_owned(),
                    source,
                }
            })?;
            Ok(PortClaim {
                host_port,
                container_port: declaration.container_port(),
                env_var: declaration.env_var().to_owned(),
            })
        })
        .collect()
}

/// Detects host port collisions before deploy and suggests free ports.
///
/// Preflight is read-only and never remaps: the caller applies the
/// suggested port as an override and runs preflight again.
pub struct PortAllocator<R, L, C>
where
    R: ConfigurationRepository,
    L: LivePortBindings,
    C: Clock + Send + Sync,
{
    store: ConfigurationStore<R, C>,
    bindings: Arc<L>,
    environment: Arc<dyn EnvironmentSource>,
    settings: Arc<EngineSettings>,
}

impl<R, L, C> Clone for PortAllocator<R, L, C>
where
    R: ConfigurationRepository,
    L: LivePortBindings,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            bindings: Arc::clone(&self.bindings),
            environment: Arc::clone(&self.environment),
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<R, L, C> PortAllocator<R, L, C>
where
    R: ConfigurationRepository,
    L: LivePortBindings,
    C: Clock + Send + Sync,
{
    /// Creates an allocator.
    #[must_use]
    pub fn new(
        store: ConfigurationStore<R, C>,
        bindings: Arc<L>,
        environment: Arc<dyn EnvironmentSource>,
        settings: Arc<EngineSettings>,
    ) -> Self {
        Self {
            store,
            bindings,
            environment,
            settings,
        }
    }

    /// Checks the ports of a stored configuration, using its effective env
    /// without capability bindings.
    ///
    /// # Errors
    ///
    /// Returns lookup, interpolation, host port or live binding errors.
    pub async fn preflight(&self, id: &ConfigurationId) -> AllocationResult<PreflightReport> {
        let configuration = self.store.get(id).await?;
        let template = self.store.template_of(&configuration)?;
        let env = self.store.interpolated_env(id).await?;
        self.preflight_resolved(&configuration, &template, &env).await
    }

    /// Checks the ports of a configuration whose env is already resolved.
    ///
    /// The set of used ports is a snapshot taken when the check starts:
    /// ports recorded by other deploying or running configurations in the
    /// same port space, plus ports the backend reports bound.
    ///
    /// # Errors
    ///
    /// Returns lookup, host port or live binding errors.
    pub async fn preflight_resolved(
        &self,
        configuration: &ServiceConfiguration,
        template: &ServiceTemplate,
        env: &BTreeMap<String, String>,
    ) -> AllocationResult<PreflightReport> {
        let port_space = configuration.target().port_space();
        let claims = claimed_ports(configuration, template, env, &self.environment.snapshot())?;
        if claims.is_empty() {
            return Ok(PreflightReport::clear(configuration.id().clone(), port_space));
        }

        let used = self.used_ports(configuration).await?;
        let mut taken: BTreeSet<u16> = used.keys().copied().collect();
        taken.extend(claims.iter().map(|claim| claim.host_port));

        let mut own: BTreeSet<u16> = BTreeSet::new();
        let mut conflicts = Vec::new();
        for claim in claims {
            let holder = used.get(&claim.host_port).cloned().or_else(|| {
                own.contains(&claim.host_port)
                    .then(|| PortHolder::Configuration(configuration.id().clone()))
            });
            own.insert(claim.host_port);

            let Some(used_by) = holder else {
                continue;
            };
            let suggested_port =
                suggest_port(claim.host_port, &taken, self.settings.port_scan_window);
            if let Some(port) = suggested_port {
                taken.insert(port);
            }
            debug!(
                configuration_id = %configuration.id(),
                port = claim.host_port,
                used_by = %used_by,
                suggested_port = ?suggested_port,
                "port conflict"
            );
            conflicts.push(PortConflict {
                declared_port: claim.host_port,
                container_port: claim.container_port,
                env_var: claim.env_var,
                used_by,
                suggested_port,
            });
        }

        if !conflicts.is_empty() {
            warn!(
                configuration_id = %configuration.id(),
                conflicts = conflicts.len(),
                "preflight found port conflicts"
            );
        }
        Ok(PreflightReport::with_conflicts(
            configuration.id().clone(),
            port_space,
            conflicts,
        ))
    }

    async fn used_ports(
        &self,
        configuration: &ServiceConfiguration,
    ) -> AllocationResult<BTreeMap<u16, PortHolder>> {
        let port_space = configuration.target().port_space();
        let mut used = BTreeMap::new();

        for other in self.store.list().await? {
            if other.id() == configuration.id() || !other.status().is_active() {
                continue;
            }
            let Some(record) = other.record() else {
                continue;
            };
            if record.target.port_space() != port_space {
                continue;
            }
            for port in &record.bound_ports {
                used.entry(*port)
                    .or_insert_with(|| PortHolder::Configuration(other.id().clone()));
            }
        }

        let own_refs = configuration.record().map(|record| &record.refs);
        for binding in self.bindings.bound_ports(configuration.target()).await? {
            if binding.refs.is_some() && binding.refs.as_ref() == own_refs {
                continue;
            }
            used.entry(binding.port)
                .or_insert(PortHolder::External(binding.holder));
        }
        Ok(used)
    }
}
