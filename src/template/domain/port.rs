//! Port, volume and exposure declarations on a service template.

use super::{TemplateError, TemplateId, variables::{self, VariableError}};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors returned while resolving a host port expression to a number.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostPortError {
    /// The expression could not be substituted.
    #[error(transparent)]
    Variable(#[from] VariableError),

    /// The substituted value is not a port number in `1..=65535`.
    #[error("'{value}' is not a valid host port")]
    NotAPort {
        /// The substituted value.
        value: String,
    },
}

/// Transport protocol of a published port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortProtocol {
    /// TCP (the default).
    #[default]
    Tcp,
    /// UDP.
    Udp,
}

impl PortProtocol {
    /// Returns the canonical lowercase representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for PortProtocol {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// How a cluster workload is exposed on the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureMode {
    /// Reachable only inside the cluster network.
    #[default]
    Internal,
    /// Published on every node at the host-facing port.
    NodePort,
    /// Published through an external load balancer at the host-facing port.
    LoadBalancer,
}

impl ExposureMode {
    /// Returns whether ports in this mode are reachable from outside the
    /// cluster and can therefore collide.
    #[must_use]
    pub const fn is_externally_addressable(self) -> bool {
        matches!(self, Self::NodePort | Self::LoadBalancer)
    }

    /// Returns the canonical lowercase representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::NodePort => "node_port",
            Self::LoadBalancer => "load_balancer",
        }
    }
}

/// A port published by a template: `host-expression:container-port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDeclaration {
    host_expression: String,
    container_port: u16,
    protocol: PortProtocol,
    name: Option<String>,
    env_var: String,
}

impl PortDeclaration {
    /// Parses a compose-style port string.
    ///
    /// Accepted forms are `"6379"`, `"6379:6379"`,
    /// `"${CACHE_PORT:-6379}:6379"` and any of these with a `/tcp` or `/udp`
    /// suffix.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Parse`] when the string does not match one of
    /// the accepted forms.
    pub fn parse(template_id: &TemplateId, raw: &str) -> Result<Self, TemplateError> {
        let parse_error = || TemplateError::Parse {
            template_id: template_id.clone(),
            raw: raw.to_owned(),
        };

        let parts = split_top_level(raw.trim(), ':');
        let (host_expression, container_part) = match parts.as_slice() {
            [container] => (None, *container),
            [host, container] => (Some(*host), *container),
            _ => return Err(parse_error()),
        };

        let (container_text, protocol) = match container_part.split_once('/') {
            None => (container_part, PortProtocol::Tcp),
            Some((port, "tcp")) => (port, PortProtocol::Tcp),
            Some((port, "udp")) => (port, PortProtocol::Udp),
            Some(_) => return Err(parse_error()),
        };

        let container_port = container_text
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(parse_error)?;

        let host_expression = host_expression
            .map_or_else(|| container_port.to_string(), |host| host.trim().to_owned());
        if host_expression.is_empty() || variables::validate(&host_expression).is_err() {
            return Err(parse_error());
        }

        Ok(Self::new(host_expression, container_port).with_protocol(protocol))
    }

    /// Creates a declaration from an already-split host expression and
    /// container port.
    #[must_use]
    pub fn new(host: impl Into<String>, container_port: u16) -> Self {
        let host_expression = host.into();
        let env_var = variables::sole_variable(&host_expression).map_or_else(
            || format!("HOST_PORT_{container_port}"),
            ToOwned::to_owned,
        );
        Self {
            host_expression,
            container_port,
            protocol: PortProtocol::Tcp,
            name: None,
            env_var,
        }
    }

    /// Sets the transport protocol.
    #[must_use]
    pub const fn with_protocol(mut self, protocol: PortProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Sets an explicit symbolic name for the port.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the host-facing port expression.
    #[must_use]
    pub fn host_expression(&self) -> &str {
        &self.host_expression
    }

    /// Returns the container-side port.
    #[must_use]
    pub const fn container_port(&self) -> u16 {
        self.container_port
    }

    /// Returns the transport protocol.
    #[must_use]
    pub const fn protocol(&self) -> PortProtocol {
        self.protocol
    }

    /// Returns the explicit symbolic name, if declared.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Resolves the host port this declaration binds.
    ///
    /// A value for [`Self::env_var`] in `env` wins outright, which is how a
    /// port override reaches a literal host port such as `"6379:6379"`.
    /// Otherwise the host expression is substituted over `env`, then
    /// `ambient`, then its embedded default.
    ///
    /// # Errors
    ///
    /// Returns [`HostPortError`] when substitution fails or the result is
    /// not a port number.
    pub fn resolve_host_port(
        &self,
        env: &BTreeMap<String, String>,
        ambient: &BTreeMap<String, String>,
    ) -> Result<u16, HostPortError> {
        let value = match env.get(&self.env_var).filter(|value| !value.trim().is_empty()) {
            Some(value) => value.clone(),
            None => variables::substitute(&self.host_expression, &[env, ambient])?,
        };
        value
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .ok_or(HostPortError::NotAPort { value })
    }

    /// Returns the override key that carries the bound host port.
    ///
    /// This is the variable of a `${NAME...}` host expression, or
    /// `HOST_PORT_<container_port>` for a literal host port.
    #[must_use]
    pub fn env_var(&self) -> &str {
        &self.env_var
    }
}

/// A volume mounted into the service container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeDeclaration {
    source: String,
    target: String,
    read_only: bool,
}

impl VolumeDeclaration {
    /// Creates a read-write volume declaration.
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            read_only: false,
        }
    }

    /// Parses a compose-style `source:target[:ro|rw]` string.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Parse`] for any other shape.
    pub fn parse(template_id: &TemplateId, raw: &str) -> Result<Self, TemplateError> {
        let parse_error = || TemplateError::Parse {
            template_id: template_id.clone(),
            raw: raw.to_owned(),
        };

        let parts = split_top_level(raw.trim(), ':');
        let (source, target, read_only) = match parts.as_slice() {
            [source, target] => (*source, *target, false),
            [source, target, "ro"] => (*source, *target, true),
            [source, target, "rw"] => (*source, *target, false),
            _ => return Err(parse_error()),
        };

        if source.is_empty() || target.is_empty() || variables::validate(source).is_err() {
            return Err(parse_error());
        }

        Ok(Self {
            source: source.to_owned(),
            target: target.to_owned(),
            read_only,
        })
    }

    /// Marks the volume read-only.
    #[must_use]
    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Returns the host-side source expression.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the container-side mount path.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns whether the mount is read-only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// Splits `text` on `separator` outside of `${...}` tokens.
fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0_usize;
    for (index, character) in text.char_indices() {
        match character {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ if character == separator && depth == 0 => {
                parts.push(text.get(start..index).unwrap_or_default());
                start = index + character.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(text.get(start..).unwrap_or_default());
    parts
}
