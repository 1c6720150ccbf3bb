//! Error types for configuration domain validation.

use super::ConfigurationId;
use thiserror::Error;

/// Errors returned while constructing or mutating configuration values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationDomainError {
    /// The configuration identifier is empty after trimming.
    #[error("configuration id must not be empty")]
    EmptyConfigurationId,

    /// The configuration identifier contains whitespace or control characters.
    #[error("configuration id '{0}' must not contain whitespace or control characters")]
    InvalidConfigurationId(String),

    /// A settings path is empty or contains an invalid segment.
    #[error("invalid settings path '{0}' (segments must match [A-Za-z0-9_-]+)")]
    InvalidPath(String),

    /// A deployment target is missing a required field.
    #[error("invalid deployment target: {0}")]
    InvalidTarget(String),

    /// Transitioning between two deployment states is invalid.
    #[error("invalid deployment transition for '{configuration_id}': {from} -> {to}")]
    InvalidLifecycleTransition {
        /// Configuration identifier.
        configuration_id: ConfigurationId,
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },
}

/// Error returned while parsing a deployment status from text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown deployment status: {0}")]
pub struct ParseDeploymentStatusError(pub String);
