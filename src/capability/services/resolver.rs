//! Capability resolution service.

use crate::capability::{
    domain::{CapabilityBinding, CapabilityDomainError, CapabilityName, ProviderSelection},
    ports::{ProviderSelectionError, ProviderSelectionRepository},
};
use crate::configuration::{
    domain::{ConfigurationId, InterpolationError, ServiceConfiguration, interpolate_env},
    ports::ConfigurationRepository,
    services::{ConfigurationStore, ConfigurationStoreError, layered_tree},
};
use crate::template::domain::variables;
use mockable::Clock;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Variable available to export expressions, holding the provider's
/// configuration id.
pub const PROVIDER_ID_VARIABLE: &str = "PROVIDER_ID";

/// Errors returned while resolving or selecting capability providers.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// A mandatory requirement has no selected provider.
    #[error("configuration {configuration_id} requires capability '{capability}' but no provider is selected")]
    UnresolvedCapability {
        /// Consuming configuration.
        configuration_id: ConfigurationId,
        /// Unresolved capability.
        capability: CapabilityName,
    },

    /// The selected provider cannot serve the capability.
    #[error("provider {provider_id} is not configured: {reason}")]
    ProviderNotConfigured {
        /// Provider configuration.
        provider_id: ConfigurationId,
        /// What is missing.
        reason: String,
    },

    /// A capability name is invalid.
    #[error(transparent)]
    Domain(#[from] CapabilityDomainError),

    /// The consumer's settings contain unresolvable references.
    #[error(transparent)]
    Interpolation(#[from] InterpolationError),

    /// Configuration lookup failed.
    #[error(transparent)]
    Store(#[from] ConfigurationStoreError),

    /// Selection persistence failed.
    #[error(transparent)]
    Selection(#[from] ProviderSelectionError),
}

/// Result type for capability operations.
pub type CapabilityResult<T> = Result<T, CapabilityError>;

/// Output of resolving one configuration's requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityResolution {
    /// One binding per satisfied requirement.
    pub bindings: Vec<CapabilityBinding>,
    /// Fully layered and interpolated env: template defaults, then binding
    /// env, then instance overrides. Variable tokens remain for the
    /// compiler.
    pub env: BTreeMap<String, String>,
}

/// Wires required capabilities to the operator's selected providers.
///
/// Resolution is side-effect free. Changing a selection never touches
/// running configurations; it is picked up by the next deploy.
pub struct CapabilityResolver<R, P, C>
where
    R: ConfigurationRepository,
    P: ProviderSelectionRepository,
    C: Clock + Send + Sync,
{
    store: ConfigurationStore<R, C>,
    selections: Arc<P>,
}

impl<R, P, C> Clone for CapabilityResolver<R, P, C>
where
    R: ConfigurationRepository,
    P: ProviderSelectionRepository,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            selections: Arc::clone(&self.selections),
        }
    }
}

impl<R, P, C> CapabilityResolver<R, P, C>
where
    R: ConfigurationRepository,
    P: ProviderSelectionRepository,
    C: Clock + Send + Sync,
{
    /// Creates a resolver.
    #[must_use]
    pub const fn new(store: ConfigurationStore<R, C>, selections: Arc<P>) -> Self {
        Self { store, selections }
    }

    /// Resolves every requirement of `configuration`.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::UnresolvedCapability`] for a mandatory
    /// requirement without a selection,
    /// [`CapabilityError::ProviderNotConfigured`] when the selected provider
    /// cannot serve it, or interpolation and lookup errors.
    pub async fn resolve(
        &self,
        configuration: &ServiceConfiguration,
    ) -> CapabilityResult<CapabilityResolution> {
        let template = self.store.template_of(configuration)?;
        let shared = self.store.shared_settings();
        let mut bindings = Vec::new();
        let mut binding_env = BTreeMap::new();

        for requirement in template.requires() {
            let Some(provider_id) = self.selections.selected(requirement.name()).await? else {
                if requirement.is_optional() {
                    debug!(
                        configuration_id = %configuration.id(),
                        capability = %requirement.name(),
                        "optional capability has no provider; skipping"
                    );
                    continue;
                }
                return Err(CapabilityError::UnresolvedCapability {
                    configuration_id: configuration.id().clone(),
                    capability: requirement.name().clone(),
                });
            };

            let env = self.provider_exports(&provider_id, requirement.name()).await?;
            binding_env.extend(env.iter().map(|(name, value)| (name.clone(), value.clone())));
            bindings.push(CapabilityBinding {
                consumer: configuration.id().clone(),
                capability: requirement.name().clone(),
                provider: provider_id,
                env,
            });
        }

        let effective = layered_tree(&template, &binding_env, configuration.overrides());
        let env = interpolate_env(&effective, &shared)?;
        Ok(CapabilityResolution { bindings, env })
    }

    /// Selects `provider_id` to serve `capability`.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::ProviderNotConfigured`] when the provider
    /// does not exist or its template does not provide the capability.
    pub async fn select_provider(
        &self,
        capability: &str,
        provider_id: &ConfigurationId,
    ) -> CapabilityResult<()> {
        let name = CapabilityName::new(capability)?;
        let provider = self.find_provider(provider_id).await?;
        let template = self
            .store
            .template_of(&provider)
            .map_err(|err| not_configured(provider_id, err.to_string()))?;
        if template.provided(&name).is_none() {
            return Err(not_configured(
                provider_id,
                format!("template '{}' does not provide '{name}'", template.id()),
            ));
        }

        self.selections.select(&name, provider_id).await?;
        info!(capability = %name, provider_id = %provider_id, "capability provider selected");
        Ok(())
    }

    /// Clears the selection for `capability`.
    ///
    /// # Errors
    ///
    /// Returns domain errors for invalid names or selection persistence
    /// errors.
    pub async fn clear_selection(&self, capability: &str) -> CapabilityResult<bool> {
        let name = CapabilityName::new(capability)?;
        Ok(self.selections.clear(&name).await?)
    }

    /// Clears every selection pointing at `provider_id`.
    ///
    /// # Errors
    ///
    /// Returns selection persistence errors.
    pub async fn release_provider(
        &self,
        provider_id: &ConfigurationId,
    ) -> CapabilityResult<Vec<CapabilityName>> {
        let released = self.selections.release_provider(provider_id).await?;
        if !released.is_empty() {
            info!(provider_id = %provider_id, released = released.len(), "provider selections released");
        }
        Ok(released)
    }

    /// Returns every provider selection.
    ///
    /// # Errors
    ///
    /// Returns selection persistence errors.
    pub async fn selections(&self) -> CapabilityResult<Vec<ProviderSelection>> {
        Ok(self.selections.list().await?)
    }

    async fn find_provider(
        &self,
        provider_id: &ConfigurationId,
    ) -> CapabilityResult<ServiceConfiguration> {
        match self.store.get(provider_id).await {
            Ok(provider) => Ok(provider),
            Err(ConfigurationStoreError::NotFound(_)) => Err(not_configured(
                provider_id,
                "provider configuration does not exist".to_owned(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn provider_exports(
        &self,
        provider_id: &ConfigurationId,
        capability: &CapabilityName,
    ) -> CapabilityResult<BTreeMap<String, String>> {
        let provider = self.find_provider(provider_id).await?;
        let template = self
            .store
            .template_of(&provider)
            .map_err(|err| not_configured(provider_id, err.to_string()))?;
        let provided = template.provided(capability).ok_or_else(|| {
            not_configured(
                provider_id,
                format!("template '{}' does not provide '{capability}'", template.id()),
            )
        })?;

        let effective = layered_tree(&template, &BTreeMap::new(), provider.overrides());
        let provider_env = interpolate_env(&effective, &self.store.shared_settings())
            .map_err(|err| not_configured(provider_id, err.to_string()))?;

        if let Some(unset) = template
            .placeholders()
            .find(|name| provider_env.get(*name).is_none_or(String::is_empty))
        {
            return Err(not_configured(provider_id, format!("'{unset}' is not set")));
        }

        let builtins = BTreeMap::from([(
            PROVIDER_ID_VARIABLE.to_owned(),
            provider_id.as_str().to_owned(),
        )]);
        let mut exports = BTreeMap::new();
        for (env_var, expression) in provided.exports() {
            let value = variables::substitute(expression, &[&provider_env, &builtins])
                .map_err(|err| not_configured(provider_id, format!("export '{env_var}': {err}")))?;
            exports.insert(env_var.clone(), value);
        }
        Ok(exports)
    }
}

fn not_configured(provider_id: &ConfigurationId, reason: String) -> CapabilityError {
    CapabilityError::ProviderNotConfigured {
        provider_id: provider_id.clone(),
        reason,
    }
}
