//! Backend-specific deployment artifacts.

use crate::configuration::domain::BackendKind;
use crate::template::domain::{ExposureMode, PortProtocol};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Container restart policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Never restart.
    No,
    /// Always restart.
    Always,
    /// Restart unless explicitly stopped.
    #[default]
    UnlessStopped,
    /// Restart after a non-zero exit.
    OnFailure,
}

impl RestartPolicy {
    /// Returns the container runtime spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::No => "no",
            Self::Always => "always",
            Self::UnlessStopped => "unless-stopped",
            Self::OnFailure => "on-failure",
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Error returned while parsing a restart policy.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("unknown restart policy: {0}")]
pub struct ParseRestartPolicyError(pub String);

impl FromStr for RestartPolicy {
    type Err = ParseRestartPolicyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "no" => Ok(Self::No),
            "always" => Ok(Self::Always),
            "unless-stopped" => Ok(Self::UnlessStopped),
            "on-failure" => Ok(Self::OnFailure),
            _ => Err(ParseRestartPolicyError(value.to_owned())),
        }
    }
}

/// Compiled output for one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    /// A single container.
    Container(ContainerArtifact),
    /// A set of cluster objects.
    Cluster(ClusterArtifactSet),
}

impl Artifact {
    /// Returns the backend family the artifact is for.
    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::Container(_) => BackendKind::Container,
            Self::Cluster(_) => BackendKind::Cluster,
        }
    }

    /// Returns the host-facing ports the artifact binds.
    #[must_use]
    pub fn bound_ports(&self) -> Vec<u16> {
        match self {
            Self::Container(container) => container
                .ports
                .iter()
                .map(|mapping| mapping.host_port)
                .collect(),
            Self::Cluster(cluster) => cluster
                .exposure
                .as_ref()
                .filter(|exposure| exposure.mode.is_externally_addressable())
                .map(|exposure| exposure.ports.iter().map(|port| port.port).collect())
                .unwrap_or_default(),
        }
    }
}

/// Host-to-container port mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Host-facing port.
    pub host_port: u16,
    /// Container-side port.
    pub container_port: u16,
    /// Transport protocol.
    pub protocol: PortProtocol,
}

/// A volume mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    /// Host path or named volume.
    pub source: String,
    /// Mount path inside the container.
    pub target: String,
    /// Whether the mount is read-only.
    pub read_only: bool,
}

/// Everything a container runtime needs to run one configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerArtifact {
    /// Container name.
    pub name: String,
    /// Concrete image reference.
    pub image: String,
    /// Fully resolved env.
    pub env: BTreeMap<String, String>,
    /// Published ports.
    pub ports: Vec<PortMapping>,
    /// Volume mounts.
    pub volumes: Vec<VolumeMount>,
    /// Restart policy.
    pub restart_policy: RestartPolicy,
    /// Identifying labels.
    pub labels: BTreeMap<String, String>,
}

/// Non-secret env values, bound in bulk into the workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigObject {
    /// Object name.
    pub name: String,
    /// Env values.
    pub data: BTreeMap<String, String>,
}

/// Secret env values, bound in bulk into the workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretObject {
    /// Object name.
    pub name: String,
    /// Env values.
    pub data: BTreeMap<String, String>,
}

/// A named container port in a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedPort {
    /// Port name, unique within the workload.
    pub name: String,
    /// Container-side port.
    pub container_port: u16,
    /// Transport protocol.
    pub protocol: PortProtocol,
}

/// HTTP readiness and liveness probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthProbe {
    /// Request path.
    pub path: String,
    /// Container port the probe targets.
    pub port: u16,
}

/// Single-replica workload descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    /// Workload name.
    pub name: String,
    /// Concrete image reference.
    pub image: String,
    /// Replica count; always one.
    pub replicas: u32,
    /// Identifying labels, also used as the pod selector.
    pub labels: BTreeMap<String, String>,
    /// Config and secret objects bound in bulk as env.
    pub env_from: Vec<String>,
    /// Named container ports.
    pub ports: Vec<NamedPort>,
    /// Health probe, present only when the template declares a path.
    pub probe: Option<HealthProbe>,
    /// Volume mounts.
    pub volumes: Vec<VolumeMount>,
}

/// A port published by an exposure descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposedPort {
    /// Name of the workload port it targets.
    pub name: String,
    /// Published port: the host-facing port for node-port and
    /// load-balancer exposure, otherwise the container port.
    pub port: u16,
    /// Container-side port.
    pub target_port: u16,
    /// Transport protocol.
    pub protocol: PortProtocol,
}

/// Network exposure descriptor for a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureDescriptor {
    /// Descriptor name.
    pub name: String,
    /// Exposure mode.
    pub mode: ExposureMode,
    /// Label selector matching the workload.
    pub selector: BTreeMap<String, String>,
    /// Published ports.
    pub ports: Vec<ExposedPort>,
}

/// Everything a cluster needs to run one configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterArtifactSet {
    /// Target namespace, created on demand by the backend.
    pub namespace: String,
    /// Non-secret env.
    pub config_object: ConfigObject,
    /// Secret env; generated even when empty.
    pub secret_object: SecretObject,
    /// The workload.
    pub workload: Workload,
    /// Exposure descriptor, present when the template publishes ports.
    pub exposure: Option<ExposureDescriptor>,
}
