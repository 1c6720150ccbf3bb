//! Backend-observed workload state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a workload exited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitInfo {
    /// Process exit code, when the backend reports one.
    pub code: Option<i32>,
    /// Backend-supplied reason, such as `OOMKilled`.
    pub reason: String,
}

impl ExitInfo {
    /// Creates exit details.
    #[must_use]
    pub fn new(code: Option<i32>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(formatter, "exited with code {code}: {}", self.reason),
            None => write!(formatter, "exited: {}", self.reason),
        }
    }
}

/// State of a submitted workload as the backend reports it.
///
/// Backends report replica counts rather than a verdict; a workload is
/// ready once every desired replica is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ObservedState {
    /// Submitted and not exited.
    Rollout {
        /// Available replicas.
        ready: u32,
        /// Replicas the workload asks for.
        desired: u32,
        /// Latest backend condition, such as `ContainerCreating`.
        condition: String,
    },
    /// The workload exited.
    Exited(ExitInfo),
    /// The backend has no record of the workload.
    Missing,
}

impl ObservedState {
    /// Creates a rollout state.
    #[must_use]
    pub fn rollout(ready: u32, desired: u32, condition: impl Into<String>) -> Self {
        Self::Rollout {
            ready,
            desired,
            condition: condition.into(),
        }
    }

    /// Returns whether every desired replica is available.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        match self {
            Self::Rollout { ready, desired, .. } => *desired > 0 && *ready >= *desired,
            Self::Exited(_) | Self::Missing => false,
        }
    }
}

impl fmt::Display for ObservedState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rollout {
                ready,
                desired,
                condition,
            } => write!(formatter, "{condition}: {ready}/{desired} replicas ready"),
            Self::Exited(exit) => write!(formatter, "{exit}"),
            Self::Missing => formatter.write_str("workload not found"),
        }
    }
}

/// Lifecycle of a container as a container runtime reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ContainerState {
    /// Created, not started.
    Created,
    /// Running.
    Running,
    /// Exited.
    Exited(ExitInfo),
}

impl From<ContainerState> for ObservedState {
    fn from(state: ContainerState) -> Self {
        match state {
            ContainerState::Created => Self::rollout(0, 1, "created"),
            ContainerState::Running => Self::rollout(1, 1, "running"),
            ContainerState::Exited(exit) => Self::Exited(exit),
        }
    }
}

/// A host port published by a running container, managed or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPort {
    /// Host-facing port.
    pub port: u16,
    /// Runtime-assigned container identifier.
    pub container_id: String,
    /// Container name.
    pub container_name: String,
}

/// A port a cluster exposes outside the cluster network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterPortBinding {
    /// Node or load-balancer port.
    pub port: u16,
    /// Namespace of the exposure descriptor.
    pub namespace: String,
    /// Exposure descriptor name.
    pub exposure: String,
}

/// Kinds of object a cluster backend manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterObjectKind {
    /// Non-secret config object.
    Config,
    /// Secret object.
    Secret,
    /// Workload.
    Workload,
    /// Exposure descriptor.
    Exposure,
}

impl ClusterObjectKind {
    /// Returns the canonical lowercase representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Secret => "secret",
            Self::Workload => "workload",
            Self::Exposure => "exposure",
        }
    }
}
