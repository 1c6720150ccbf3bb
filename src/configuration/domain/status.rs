//! Deployment status state machine.

use super::ParseDeploymentStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deployment status of a service configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Created but never deployed.
    #[default]
    Pending,
    /// A deploy is in flight.
    Deploying,
    /// Deployed and confirmed ready.
    Running,
    /// Torn down by an undeploy.
    Stopped,
    /// The last deploy failed or the running workload crashed.
    Error,
}

impl DeploymentStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Deploying => "deploying",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    /// Returns whether the configuration may hold backend resources or
    /// bound ports.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Deploying | Self::Running)
    }

    /// Returns whether transition to `target` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (
                Self::Pending | Self::Running | Self::Stopped | Self::Error,
                Self::Deploying
            ) | (Self::Deploying, Self::Running | Self::Error)
                | (Self::Running, Self::Stopped | Self::Error)
                | (Self::Error, Self::Stopped)
        )
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for DeploymentStatus {
    type Error = ParseDeploymentStatusError;

    fn try_from(value: &str) -> Result<Self, ParseDeploymentStatusError> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "deploying" => Ok(Self::Deploying),
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "error" => Ok(DeploymentStatus::Error),
            _ => Err(ParseDeploymentStatusError(value.to_owned())),
        }
    }
}
