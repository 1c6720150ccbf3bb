//! Compiler input.

use super::RestartPolicy;
use crate::capability::domain::CapabilityBinding;
use crate::configuration::domain::{ConfigurationId, DeploymentTarget};
use crate::template::domain::ServiceTemplate;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A configuration with its capabilities resolved and its env interpolated.
///
/// This is everything [`super::compile`] needs; compilation performs no
/// lookups of its own.
#[derive(Debug, Clone)]
pub struct ResolvedConfiguration {
    /// Configuration identifier.
    pub configuration_id: ConfigurationId,
    /// The template the configuration instantiates.
    pub template: Arc<ServiceTemplate>,
    /// Where the configuration deploys.
    pub target: DeploymentTarget,
    /// Effective env after layering and path interpolation. Values may still
    /// carry `${NAME}` variable tokens.
    pub env: BTreeMap<String, String>,
    /// Instance overrides at top-level keys, interpolated. Image variables
    /// consult these before the process environment.
    pub overrides: BTreeMap<String, String>,
    /// Capability bindings that contributed to `env`.
    pub bindings: Vec<CapabilityBinding>,
    /// Process environment snapshot consulted after `env`.
    pub ambient: BTreeMap<String, String>,
    /// Container restart policy.
    pub restart_policy: RestartPolicy,
    /// Value of the managed-by label.
    pub managed_by: String,
}
