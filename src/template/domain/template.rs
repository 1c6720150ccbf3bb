//! Service template aggregate.

use super::{
    ExposureMode, PortDeclaration, TemplateError, TemplateId, VolumeDeclaration, variables,
};
use crate::capability::domain::{CapabilityName, CapabilityRequirement, ProvidedCapability};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declarative definition of a deployable service.
///
/// Env vars map a name to an optional default. A `None` default is a
/// placeholder: an instance must supply the value before it can compile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTemplate {
    id: TemplateId,
    image: String,
    ports: Vec<PortDeclaration>,
    env: BTreeMap<String, Option<String>>,
    provides: Vec<ProvidedCapability>,
    requires: Vec<CapabilityRequirement>,
    health_check_path: Option<String>,
    volumes: Vec<VolumeDeclaration>,
    exposure: ExposureMode,
}

impl ServiceTemplate {
    /// Creates a template with an image reference and no other declarations.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::EmptyImage`] when the image is blank, or
    /// [`TemplateError::Parse`] when it contains malformed tokens.
    pub fn new(id: TemplateId, image: impl Into<String>) -> Result<Self, TemplateError> {
        let reference = image.into().trim().to_owned();
        if reference.is_empty() {
            return Err(TemplateError::EmptyImage { template_id: id });
        }
        check_syntax(&id, &reference)?;

        Ok(Self {
            id,
            image: reference,
            ports: Vec::new(),
            env: BTreeMap::new(),
            provides: Vec::new(),
            requires: Vec::new(),
            health_check_path: None,
            volumes: Vec::new(),
            exposure: ExposureMode::Internal,
        })
    }

    /// Adds a port declaration.
    #[must_use]
    pub fn with_port(mut self, port: PortDeclaration) -> Self {
        self.ports.push(port);
        self
    }

    /// Declares an env var with a default value.
    #[must_use]
    pub fn with_env(mut self, name: impl Into<String>, default: impl Into<String>) -> Self {
        self.env.insert(name.into(), Some(default.into()));
        self
    }

    /// Declares an env var the instance must supply.
    #[must_use]
    pub fn with_placeholder(mut self, name: impl Into<String>) -> Self {
        self.env.insert(name.into(), None);
        self
    }

    /// Declares a capability this template provides.
    #[must_use]
    pub fn providing(mut self, capability: ProvidedCapability) -> Self {
        self.provides.push(capability);
        self
    }

    /// Declares a capability this template requires.
    #[must_use]
    pub fn requiring(mut self, requirement: CapabilityRequirement) -> Self {
        self.requires.push(requirement);
        self
    }

    /// Declares the HTTP path answering health checks.
    #[must_use]
    pub fn with_health_check(mut self, path: impl Into<String>) -> Self {
        self.health_check_path = Some(path.into());
        self
    }

    /// Adds a volume declaration.
    #[must_use]
    pub fn with_volume(mut self, volume: VolumeDeclaration) -> Self {
        self.volumes.push(volume);
        self
    }

    /// Sets the cluster exposure mode.
    #[must_use]
    pub const fn with_exposure(mut self, exposure: ExposureMode) -> Self {
        self.exposure = exposure;
        self
    }

    /// Checks every expression in the template for malformed tokens.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Parse`] naming the first malformed value.
    pub fn validate(&self) -> Result<(), TemplateError> {
        check_syntax(&self.id, &self.image)?;
        for default in self.env.values().flatten() {
            check_syntax(&self.id, default)?;
        }
        for port in &self.ports {
            check_syntax(&self.id, port.host_expression())?;
        }
        for volume in &self.volumes {
            check_syntax(&self.id, volume.source())?;
        }
        for capability in &self.provides {
            for export in capability.exports().values() {
                check_syntax(&self.id, export)?;
            }
        }
        Ok(())
    }

    /// Returns the template identifier.
    #[must_use]
    pub const fn id(&self) -> &TemplateId {
        &self.id
    }

    /// Returns the image reference, possibly containing variable tokens.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Returns the ordered port declarations.
    #[must_use]
    pub fn ports(&self) -> &[PortDeclaration] {
        &self.ports
    }

    /// Returns the env var declarations.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, Option<String>> {
        &self.env
    }

    /// Returns env vars declared with a default value.
    pub fn env_defaults(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env
            .iter()
            .filter_map(|(name, default)| default.as_deref().map(|value| (name.as_str(), value)))
    }

    /// Returns env var names the instance must supply.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.env
            .iter()
            .filter(|(_, default)| default.is_none())
            .map(|(name, _)| name.as_str())
    }

    /// Returns the provided capabilities.
    #[must_use]
    pub fn provides(&self) -> &[ProvidedCapability] {
        &self.provides
    }

    /// Returns the provided capability with the given name, if any.
    #[must_use]
    pub fn provided(&self, name: &CapabilityName) -> Option<&ProvidedCapability> {
        self.provides
            .iter()
            .find(|capability| capability.name() == name)
    }

    /// Returns the required capabilities.
    #[must_use]
    pub fn requires(&self) -> &[CapabilityRequirement] {
        &self.requires
    }

    /// Returns the health-check path, if declared.
    #[must_use]
    pub fn health_check_path(&self) -> Option<&str> {
        self.health_check_path.as_deref()
    }

    /// Returns the volume declarations.
    #[must_use]
    pub fn volumes(&self) -> &[VolumeDeclaration] {
        &self.volumes
    }

    /// Returns the cluster exposure mode.
    #[must_use]
    pub const fn exposure(&self) -> ExposureMode {
        self.exposure
    }
}

fn check_syntax(template_id: &TemplateId, raw: &str) -> Result<(), TemplateError> {
    variables::validate(raw).map_err(|_| TemplateError::Parse {
        template_id: template_id.clone(),
        raw: raw.to_owned(),
    })
}
