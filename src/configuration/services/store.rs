//! Service configuration store.

use super::{ConflictInProgress, OperationGuards, OperationPermit};
use crate::configuration::{
    domain::{
        ConfigNode, ConfigPath, ConfigTree, ConfigurationDomainError, ConfigurationId,
        DeploymentStatus, DeploymentTarget, InterpolationError, OverrideOutcome,
        ServiceConfiguration, interpolate_env,
    },
    ports::{ConfigurationRepository, ConfigurationRepositoryError},
};
use crate::template::{
    domain::{ServiceTemplate, TemplateError, TemplateId},
    services::{TemplateRegistry, TemplateRegistryError},
};
use mockable::Clock;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info};

/// Request payload for creating a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateConfigurationRequest {
    /// Operator-chosen configuration identifier.
    pub id: String,
    /// Template to instantiate.
    pub template_id: String,
    /// Deployment target.
    pub target: DeploymentTarget,
}

impl CreateConfigurationRequest {
    /// Creates a request targeting the local container runtime.
    #[must_use]
    pub fn new(id: impl Into<String>, template_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template_id: template_id.into(),
            target: DeploymentTarget::Local,
        }
    }

    /// Sets the deployment target.
    #[must_use]
    pub fn with_target(mut self, target: DeploymentTarget) -> Self {
        self.target = target;
        self
    }
}

/// Service-level errors for configuration store operations.
#[derive(Debug, Error)]
pub enum ConfigurationStoreError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] ConfigurationDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] ConfigurationRepositoryError),
    /// A template identifier is invalid.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// Template registry access failed.
    #[error(transparent)]
    Registry(#[from] TemplateRegistryError),
    /// Path references could not be resolved.
    #[error(transparent)]
    Interpolation(#[from] InterpolationError),
    /// Another operation on the configuration is in flight.
    #[error(transparent)]
    Conflict(#[from] ConflictInProgress),
    /// No configuration exists with the given identifier.
    #[error("configuration {0} not found")]
    NotFound(ConfigurationId),
    /// The referenced template is not loaded.
    #[error("template '{template_id}' is not loaded")]
    TemplateMissing {
        /// Missing template identifier.
        template_id: TemplateId,
    },
    /// The configuration holds backend resources and cannot be deleted.
    #[error("configuration {configuration_id} is {status}; undeploy it first")]
    ConfigurationActive {
        /// Configuration identifier.
        configuration_id: ConfigurationId,
        /// Current status.
        status: DeploymentStatus,
    },
    /// A permit for one configuration was used to save another.
    #[error("permit for {permit} cannot save configuration {configuration_id}")]
    PermitMismatch {
        /// Configuration the permit covers.
        permit: ConfigurationId,
        /// Configuration being saved.
        configuration_id: ConfigurationId,
    },
}

/// Result type for configuration store operations.
pub type ConfigurationStoreResult<T> = Result<T, ConfigurationStoreError>;

#[derive(Debug, Default)]
struct SharedLayers {
    defaults: ConfigTree,
    operator: ConfigTree,
}

/// Owns service configurations, their overrides and the shared settings
/// tree.
///
/// Reads never block on in-flight operations. Mutations of one
/// configuration are serialized through [`OperationGuards`] and fail fast
/// with [`ConflictInProgress`] while a deploy or undeploy holds the permit.
pub struct ConfigurationStore<R, C>
where
    R: ConfigurationRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    templates: TemplateRegistry,
    guards: OperationGuards,
    shared: Arc<RwLock<SharedLayers>>,
    clock: Arc<C>,
}

impl<R, C> Clone for ConfigurationStore<R, C>
where
    R: ConfigurationRepository,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            templates: self.templates.clone(),
            guards: self.guards.clone(),
            shared: Arc::clone(&self.shared),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R, C> ConfigurationStore<R, C>
where
    R: ConfigurationRepository,
    C: Clock + Send + Sync,
{
    /// Creates a store over `repository`, validating template references
    /// against `templates`.
    #[must_use]
    pub fn new(repository: Arc<R>, templates: TemplateRegistry, clock: Arc<C>) -> Self {
        Self {
            repository,
            templates,
            guards: OperationGuards::new(),
            shared: Arc::new(RwLock::new(SharedLayers::default())),
            clock,
        }
    }

    /// Seeds the shared settings defaults layer.
    #[must_use]
    pub fn with_shared_defaults(self, defaults: ConfigTree) -> Self {
        self.shared
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .defaults = defaults;
        self
    }

    /// Returns the operation guards shared with the deployment manager.
    #[must_use]
    pub const fn guards(&self) -> &OperationGuards {
        &self.guards
    }

    /// Returns the template registry.
    #[must_use]
    pub const fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    /// Returns the clock.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Creates a pending configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationStoreError::TemplateMissing`] when the template
    /// is not loaded, domain errors for invalid identifiers, or repository
    /// errors such as a duplicate identifier.
    pub async fn create(
        &self,
        request: CreateConfigurationRequest,
    ) -> ConfigurationStoreResult<ServiceConfiguration> {
        let id = ConfigurationId::new(request.id)?;
        let template_id = TemplateId::new(request.template_id)?;
        if self.templates.get(&template_id)?.is_none() {
            return Err(ConfigurationStoreError::TemplateMissing { template_id });
        }

        let configuration = ServiceConfiguration::new(id, template_id, request.target, &*self.clock);
        self.repository.insert(&configuration).await?;
        info!(
            configuration_id = %configuration.id(),
            template_id = %configuration.template_id(),
            target = %configuration.target(),
            "configuration created"
        );
        Ok(configuration)
    }

    /// Returns a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationStoreError::NotFound`] when it does not exist.
    pub async fn get(&self, id: &ConfigurationId) -> ConfigurationStoreResult<ServiceConfiguration> {
        self.repository
            .find(id)
            .await?
            .ok_or_else(|| ConfigurationStoreError::NotFound(id.clone()))
    }

    /// Returns every configuration.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn list(&self) -> ConfigurationStoreResult<Vec<ServiceConfiguration>> {
        Ok(self.repository.list().await?)
    }

    /// Returns the template a configuration instantiates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationStoreError::TemplateMissing`] when the template
    /// has disappeared from the registry.
    pub fn template_of(
        &self,
        configuration: &ServiceConfiguration,
    ) -> ConfigurationStoreResult<Arc<ServiceTemplate>> {
        self.templates
            .get(configuration.template_id())?
            .ok_or_else(|| ConfigurationStoreError::TemplateMissing {
                template_id: configuration.template_id().clone(),
            })
    }

    /// Returns template defaults deep-merged with the configuration's
    /// overrides. Overrides win per key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationStoreError::NotFound`] or
    /// [`ConfigurationStoreError::TemplateMissing`].
    pub async fn effective(&self, id: &ConfigurationId) -> ConfigurationStoreResult<ConfigTree> {
        let configuration = self.get(id).await?;
        let template = self.template_of(&configuration)?;
        Ok(layered_tree(&template, &BTreeMap::new(), configuration.overrides()))
    }

    /// Returns the effective env of a configuration with every path
    /// reference resolved against the shared settings.
    ///
    /// Capability bindings are not included; see the capability resolver.
    ///
    /// # Errors
    ///
    /// Returns lookup errors or [`ConfigurationStoreError::Interpolation`].
    pub async fn interpolated_env(
        &self,
        id: &ConfigurationId,
    ) -> ConfigurationStoreResult<BTreeMap<String, String>> {
        let effective = self.effective(id).await?;
        Ok(interpolate_env(&effective, &self.shared_settings())?)
    }

    /// Sets an override. Writing the value already stored changes nothing
    /// and leaves `updated_at` untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationStoreError::Conflict`] while a deploy or
    /// undeploy is in flight, domain errors for invalid paths, or lookup and
    /// repository errors.
    pub async fn apply_override(
        &self,
        id: &ConfigurationId,
        path: &str,
        value: impl Into<ConfigNode> + Send,
    ) -> ConfigurationStoreResult<OverrideOutcome> {
        let parsed = ConfigPath::parse(path)?;
        let node = value.into();
        let permit = self.guards.try_begin(id)?;
        let mut configuration = self.get(id).await?;

        let outcome = configuration.set_override(&parsed, node, &*self.clock);
        if outcome.is_changed() {
            self.save(&permit, &configuration).await?;
            debug!(configuration_id = %id, path = %parsed, "override applied");
        }
        Ok(outcome)
    }

    /// Removes an override.
    ///
    /// # Errors
    ///
    /// As for [`Self::apply_override`].
    pub async fn remove_override(
        &self,
        id: &ConfigurationId,
        path: &str,
    ) -> ConfigurationStoreResult<OverrideOutcome> {
        let parsed = ConfigPath::parse(path)?;
        let permit = self.guards.try_begin(id)?;
        let mut configuration = self.get(id).await?;

        let outcome = configuration.remove_override(&parsed, &*self.clock);
        if outcome.is_changed() {
            self.save(&permit, &configuration).await?;
            debug!(configuration_id = %id, path = %parsed, "override removed");
        }
        Ok(outcome)
    }

    /// Points a configuration at another target. Running deployments move
    /// at the next deploy.
    ///
    /// # Errors
    ///
    /// As for [`Self::apply_override`].
    pub async fn retarget(
        &self,
        id: &ConfigurationId,
        target: DeploymentTarget,
    ) -> ConfigurationStoreResult<OverrideOutcome> {
        let permit = self.guards.try_begin(id)?;
        let mut configuration = self.get(id).await?;

        let outcome = configuration.retarget(target, &*self.clock);
        if outcome.is_changed() {
            self.save(&permit, &configuration).await?;
            info!(configuration_id = %id, target = %configuration.target(), "configuration retargeted");
        }
        Ok(outcome)
    }

    /// Deletes an inactive configuration. Its overrides, and with them its
    /// port allocations, go away with it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationStoreError::ConfigurationActive`] while it is
    /// deploying or running, [`ConfigurationStoreError::Conflict`] while an
    /// operation is in flight, or lookup and repository errors.
    pub async fn delete(&self, id: &ConfigurationId) -> ConfigurationStoreResult<()> {
        let permit = self.guards.try_begin(id)?;
        self.delete_with(&permit).await
    }

    /// Deletes an inactive configuration under an already-held permit.
    ///
    /// # Errors
    ///
    /// As for [`Self::delete`].
    pub async fn delete_with(&self, permit: &OperationPermit) -> ConfigurationStoreResult<()> {
        let configuration = self.get(permit.id()).await?;
        if configuration.status().is_active() {
            return Err(ConfigurationStoreError::ConfigurationActive {
                configuration_id: configuration.id().clone(),
                status: configuration.status(),
            });
        }

        if !self.repository.delete(permit.id()).await? {
            return Err(ConfigurationStoreError::NotFound(permit.id().clone()));
        }
        self.guards.forget(permit.id());
        info!(configuration_id = %permit.id(), "configuration deleted");
        Ok(())
    }

    /// Persists a configuration mutated under `permit`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationStoreError::PermitMismatch`] when the permit
    /// covers a different configuration, or repository errors.
    pub async fn save(
        &self,
        permit: &OperationPermit,
        configuration: &ServiceConfiguration,
    ) -> ConfigurationStoreResult<()> {
        if permit.id() != configuration.id() {
            return Err(ConfigurationStoreError::PermitMismatch {
                permit: permit.id().clone(),
                configuration_id: configuration.id().clone(),
            });
        }
        Ok(self.repository.update(configuration).await?)
    }

    /// Sets a value in the operator layer of the shared settings.
    ///
    /// # Errors
    ///
    /// Returns domain errors for invalid paths.
    pub fn set_shared(
        &self,
        path: &str,
        value: impl Into<ConfigNode>,
    ) -> ConfigurationStoreResult<OverrideOutcome> {
        let parsed = ConfigPath::parse(path)?;
        let mut shared = self.shared.write().unwrap_or_else(PoisonError::into_inner);
        Ok(if shared.operator.set(&parsed, value.into()) {
            OverrideOutcome::Changed
        } else {
            OverrideOutcome::Unchanged
        })
    }

    /// Returns the shared settings: defaults with the operator layer merged
    /// on top.
    #[must_use]
    pub fn shared_settings(&self) -> ConfigTree {
        let shared = self.shared.read().unwrap_or_else(PoisonError::into_inner);
        shared.defaults.merged(&shared.operator)
    }
}

/// Builds the layered settings of one configuration: template defaults,
/// then capability binding env, then instance overrides.
#[must_use]
pub fn layered_tree(
    template: &ServiceTemplate,
    binding_env: &BTreeMap<String, String>,
    overrides: &ConfigTree,
) -> ConfigTree {
    ConfigTree::from_values(template.env_defaults())
        .merged(&ConfigTree::from_values(binding_env.clone()))
        .merged(overrides)
}
