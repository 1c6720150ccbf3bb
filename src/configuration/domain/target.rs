//! Deployment targets and the backend families that serve them.

use super::ConfigurationDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a configuration runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeploymentTarget {
    /// The local single-host container runtime.
    Local,
    /// A container runtime on another host.
    RemoteHost {
        /// Host name or address of the container runtime.
        host: String,
    },
    /// A cluster orchestrator.
    Cluster {
        /// Cluster context (credentials and endpoint) name.
        context: String,
        /// Namespace that receives the workload.
        namespace: String,
    },
}

impl DeploymentTarget {
    /// Creates a remote-host target.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationDomainError::InvalidTarget`] when the host is
    /// blank.
    pub fn remote_host(host: impl Into<String>) -> Result<Self, ConfigurationDomainError> {
        Ok(Self::RemoteHost {
            host: required(host.into(), "remote host name")?,
        })
    }

    /// Creates a cluster target.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationDomainError::InvalidTarget`] when the context or
    /// namespace is blank.
    pub fn cluster(
        context: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Result<Self, ConfigurationDomainError> {
        Ok(Self::Cluster {
            context: required(context.into(), "cluster context")?,
            namespace: required(namespace.into(), "cluster namespace")?,
        })
    }

    /// Returns the backend family that deploys to this target.
    #[must_use]
    pub const fn backend_kind(&self) -> BackendKind {
        match self {
            Self::Local | Self::RemoteHost { .. } => BackendKind::Container,
            Self::Cluster { .. } => BackendKind::Cluster,
        }
    }

    /// Returns the space in which host-facing ports must be unique.
    ///
    /// The port space also keys backend client handles: one handle serves
    /// one host or one cluster context.
    #[must_use]
    pub fn port_space(&self) -> PortSpace {
        match self {
            Self::Local => PortSpace::Host(LOCAL_HOST.to_owned()),
            Self::RemoteHost { host } => PortSpace::Host(host.clone()),
            Self::Cluster { context, .. } => PortSpace::Cluster(context.clone()),
        }
    }
}

impl fmt::Display for DeploymentTarget {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => formatter.write_str("local"),
            Self::RemoteHost { host } => write!(formatter, "remote_host({host})"),
            Self::Cluster { context, namespace } => {
                write!(formatter, "cluster({context}/{namespace})")
            }
        }
    }
}

const LOCAL_HOST: &str = "localhost";

fn required(value: String, what: &str) -> Result<String, ConfigurationDomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigurationDomainError::InvalidTarget(format!(
            "{what} must not be empty"
        )));
    }
    Ok(trimmed.to_owned())
}

/// Backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Single-host container runtime.
    Container,
    /// Cluster orchestrator.
    Cluster,
}

impl BackendKind {
    /// Returns the canonical lowercase representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Cluster => "cluster",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A namespace of host-facing ports: one host, or one cluster context.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortSpace {
    /// Ports bound on a container host.
    Host(String),
    /// Node or load-balancer ports of a cluster context.
    Cluster(String),
}

impl fmt::Display for PortSpace {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(host) => write!(formatter, "host:{host}"),
            Self::Cluster(context) => write!(formatter, "cluster:{context}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_and_remote_hosts_are_distinct_port_spaces() {
        let remote = DeploymentTarget::remote_host("build-box").expect("valid target");

        assert_ne!(DeploymentTarget::Local.port_space(), remote.port_space());
        assert_eq!(remote.backend_kind(), BackendKind::Container);
    }

    #[test]
    fn cluster_namespaces_share_a_port_space() {
        let staging = DeploymentTarget::cluster("prod", "staging").expect("valid target");
        let tools = DeploymentTarget::cluster("prod", "tools").expect("valid target");

        assert_eq!(staging.port_space(), tools.port_space());
        assert_eq!(staging.backend_kind(), BackendKind::Cluster);
    }

    #[test]
    fn blank_cluster_context_is_rejected() {
        assert!(matches!(
            DeploymentTarget::cluster(" ", "default"),
            Err(ConfigurationDomainError::InvalidTarget(_))
        ));
    }
}
