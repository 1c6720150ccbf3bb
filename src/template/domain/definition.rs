//! Raw template records supplied by a template source.

use super::{
    ExposureMode, PortDeclaration, ServiceTemplate, TemplateError, TemplateId, VolumeDeclaration,
};
use crate::capability::domain::{CapabilityName, CapabilityRequirement, ProvidedCapability};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unvalidated template record, as loaded by a template source.
///
/// # Examples
///
/// ```
/// use deckhand::template::domain::{ServiceTemplate, TemplateDefinition};
///
/// let definition: TemplateDefinition = serde_json::from_str(
///     r#"{"id": "cache", "image": "registry/cache:${CACHE_TAG:-latest}", "ports": ["6379:6379"]}"#,
/// )
/// .expect("valid JSON");
/// let template = ServiceTemplate::from_definition(definition).expect("valid template");
/// assert_eq!(template.ports().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    /// Template identifier.
    pub id: String,
    /// Image reference, possibly containing variable tokens.
    pub image: String,
    /// Port strings, optionally named.
    #[serde(default)]
    pub ports: Vec<PortDefinition>,
    /// Env var name to default; `null` marks a placeholder.
    #[serde(default)]
    pub env: BTreeMap<String, Option<String>>,
    /// Capabilities the service provides.
    #[serde(default)]
    pub provides: Vec<ProvidedDefinition>,
    /// Capabilities the service requires.
    #[serde(default)]
    pub requires: Vec<RequirementDefinition>,
    /// HTTP path answering health checks.
    #[serde(default)]
    pub health_check: Option<String>,
    /// Volume strings in `source:target[:ro]` form.
    #[serde(default)]
    pub volumes: Vec<String>,
    /// Cluster exposure mode.
    #[serde(default)]
    pub exposure: ExposureMode,
}

/// A port entry in a template record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortDefinition {
    /// Bare compose-style port string.
    Short(String),
    /// Port string with an explicit symbolic name.
    Named {
        /// Compose-style port string.
        port: String,
        /// Symbolic port name.
        name: String,
    },
}

/// A provided-capability entry in a template record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidedDefinition {
    /// Capability name.
    pub capability: String,
    /// Consumer env var name to value expression over the provider's env.
    #[serde(default)]
    pub exports: BTreeMap<String, String>,
}

/// A required-capability entry in a template record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementDefinition {
    /// Capability name.
    pub capability: String,
    /// Whether deployment may proceed without a provider.
    #[serde(default)]
    pub optional: bool,
}

impl ServiceTemplate {
    /// Parses and validates a raw template record.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when any field fails validation. Malformed
    /// variable syntax anywhere in the record is reported as
    /// [`TemplateError::Parse`].
    pub fn from_definition(definition: TemplateDefinition) -> Result<Self, TemplateError> {
        let TemplateDefinition {
            id,
            image,
            ports,
            env,
            provides,
            requires,
            health_check,
            volumes,
            exposure,
        } = definition;

        let template_id = TemplateId::new(id)?;
        let mut template = Self::new(template_id.clone(), image)?.with_exposure(exposure);

        for port in ports {
            let declaration = match port {
                PortDefinition::Short(raw) => PortDeclaration::parse(&template_id, &raw)?,
                PortDefinition::Named { port: raw, name } => {
                    PortDeclaration::parse(&template_id, &raw)?.with_name(name)
                }
            };
            template = template.with_port(declaration);
        }

        for (name, default) in env {
            template = match default {
                Some(value) => template.with_env(name, value),
                None => template.with_placeholder(name),
            };
        }

        for provided in provides {
            let name = capability_name(&template_id, provided.capability)?;
            template = template.providing(ProvidedCapability::new(name).with_exports(provided.exports));
        }

        for required in requires {
            let name = capability_name(&template_id, required.capability)?;
            let requirement = if required.optional {
                CapabilityRequirement::optional(name)
            } else {
                CapabilityRequirement::mandatory(name)
            };
            template = template.requiring(requirement);
        }

        if let Some(path) = health_check {
            template = template.with_health_check(path);
        }

        for raw in volumes {
            template = template.with_volume(VolumeDeclaration::parse(&template_id, &raw)?);
        }

        template.validate()?;
        Ok(template)
    }
}

fn capability_name(template_id: &TemplateId, raw: String) -> Result<CapabilityName, TemplateError> {
    CapabilityName::new(raw).map_err(|error| TemplateError::InvalidCapability {
        template_id: template_id.clone(),
        reason: error.to_string(),
    })
}
