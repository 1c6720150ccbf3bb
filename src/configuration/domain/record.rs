//! Records of where and how a configuration was deployed.

use super::DeploymentTarget;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend-side handles for a deployed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuntimeRefs {
    /// A container on a single host.
    Container {
        /// Runtime-assigned container identifier.
        container_id: String,
        /// Container name.
        name: String,
    },
    /// Objects in a cluster namespace.
    Cluster {
        /// Namespace holding the objects.
        namespace: String,
        /// Non-secret config object name.
        config_object: String,
        /// Secret object name.
        secret_object: String,
        /// Workload name.
        workload: String,
        /// Exposure descriptor name, if one was created.
        exposure: Option<String>,
    },
}

impl fmt::Display for RuntimeRefs {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container { name, .. } => write!(formatter, "container/{name}"),
            Self::Cluster {
                namespace,
                workload,
                ..
            } => write!(formatter, "{namespace}/{workload}"),
        }
    }
}

/// What the last successful submit produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Target the artifacts were submitted to.
    pub target: DeploymentTarget,
    /// Backend handles.
    pub refs: RuntimeRefs,
    /// Fingerprint of the submitted artifact.
    pub fingerprint: String,
    /// Host-facing ports the deployment binds.
    pub bound_ports: Vec<u16>,
    /// When the deployment was confirmed ready.
    pub deployed_at: DateTime<Utc>,
}

/// Category of a deployment failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The workload did not become ready in time.
    BackendTimeout,
    /// The workload exited.
    RuntimeCrash,
    /// The backend refused the artifact.
    BackendRejected,
    /// A host port could not be bound.
    PortBindFailed,
    /// Any other backend failure.
    Backend,
}

impl FailureKind {
    /// Returns the canonical lowercase representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BackendTimeout => "backend_timeout",
            Self::RuntimeCrash => "runtime_crash",
            Self::BackendRejected => "backend_rejected",
            Self::PortBindFailed => "port_bind_failed",
            Self::Backend => "backend",
        }
    }
}

/// Last failure recorded against a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentFailure {
    /// Failure category.
    pub kind: FailureKind,
    /// Human-readable detail.
    pub message: String,
    /// When the failure was observed.
    pub observed_at: DateTime<Utc>,
}
