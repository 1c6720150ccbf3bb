//! Preflight reports and port conflicts.

use crate::configuration::domain::{ConfigurationId, PortSpace, RuntimeRefs};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who holds a host port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortHolder {
    /// Another managed configuration.
    Configuration(ConfigurationId),
    /// A process or workload the engine does not manage.
    External(String),
}

impl fmt::Display for PortHolder {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(id) => write!(formatter, "configuration {id}"),
            Self::External(description) => write!(formatter, "external {description}"),
        }
    }
}

/// A host port observed bound on a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// Host-facing port.
    pub port: u16,
    /// Description of the binder, such as a container name.
    pub holder: String,
    /// Handles of the binder when it is a managed deployment.
    pub refs: Option<RuntimeRefs>,
}

impl PortBinding {
    /// Creates a binding held by an unmanaged process.
    #[must_use]
    pub fn external(port: u16, holder: impl Into<String>) -> Self {
        Self {
            port,
            holder: holder.into(),
            refs: None,
        }
    }

    /// Attaches the binder's runtime handles.
    #[must_use]
    pub fn with_refs(mut self, refs: RuntimeRefs) -> Self {
        self.refs = Some(refs);
        self
    }
}

/// A declared port that collides with one already in use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConflict {
    /// Host port the configuration would bind.
    pub declared_port: u16,
    /// Container-side port of the declaration.
    pub container_port: u16,
    /// Override key that carries the host port.
    pub env_var: String,
    /// Current holder of the port.
    pub used_by: PortHolder,
    /// Nearest free port above the declared one, if any.
    pub suggested_port: Option<u16>,
}

impl PortConflict {
    /// Returns whether a free alternative was found.
    #[must_use]
    pub const fn has_suggestion(&self) -> bool {
        self.suggested_port.is_some()
    }
}

/// Result of checking a configuration's ports before deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreflightReport {
    /// Configuration checked.
    pub configuration_id: ConfigurationId,
    /// Port space checked.
    pub port_space: PortSpace,
    /// Whether the configuration can start without remapping.
    pub can_start: bool,
    /// Every collision found.
    pub conflicts: Vec<PortConflict>,
}

impl PreflightReport {
    /// Creates a report with no conflicts.
    #[must_use]
    pub const fn clear(configuration_id: ConfigurationId, port_space: PortSpace) -> Self {
        Self {
            configuration_id,
            port_space,
            can_start: true,
            conflicts: Vec::new(),
        }
    }

    /// Creates a report from the collisions found.
    #[must_use]
    pub fn with_conflicts(
        configuration_id: ConfigurationId,
        port_space: PortSpace,
        conflicts: Vec<PortConflict>,
    ) -> Self {
        Self {
            configuration_id,
            port_space,
            can_start: conflicts.is_empty(),
            conflicts,
        }
    }
}
