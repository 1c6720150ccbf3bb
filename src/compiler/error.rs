//! Compilation errors.

use crate::configuration::domain::ConfigurationId;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned while compiling a resolved configuration.
///
/// Every variant is deterministic: compiling the same input again fails the
/// same way.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// A value contains malformed variable syntax.
    #[error("configuration {configuration_id}: malformed value '{raw}'")]
    Parse {
        /// Configuration identifier.
        configuration_id: ConfigurationId,
        /// Offending raw value.
        raw: String,
    },

    /// A variable or placeholder has no value.
    #[error("configuration {configuration_id}: unresolved variable '{name}'")]
    UnresolvedVariable {
        /// Configuration identifier.
        configuration_id: ConfigurationId,
        /// Variable name.
        name: String,
    },

    /// Env values reference each other in a loop.
    #[error("configuration {configuration_id}: cyclic variable reference {}", chain.join(" -> "))]
    CyclicVariable {
        /// Configuration identifier.
        configuration_id: ConfigurationId,
        /// Variables on the loop, ending with the first one repeated.
        chain: Vec<String>,
    },

    /// Two ports of one workload share a name.
    #[error("configuration {configuration_id}: duplicate port name '{name}'")]
    DuplicatePortName {
        /// Configuration identifier.
        configuration_id: ConfigurationId,
        /// Colliding name.
        name: String,
    },

    /// An identifier sanitizes to nothing or is too long.
    #[error("configuration {configuration_id}: '{value}' is not a valid {kind} identifier")]
    InvalidIdentifier {
        /// Configuration identifier.
        configuration_id: ConfigurationId,
        /// The value before sanitization.
        value: String,
        /// What the identifier names.
        kind: &'static str,
    },

    /// A host port expression resolves to something other than a port.
    #[error("configuration {configuration_id}: '{value}' for {env_var} is not a valid port")]
    InvalidPort {
        /// Configuration identifier.
        configuration_id: ConfigurationId,
        /// Override key of the declaration.
        env_var: String,
        /// Resolved value.
        value: String,
    },

    /// The artifact could not be serialized for fingerprinting.
    #[error("artifact serialization failed: {0}")]
    Serialize(Arc<serde_json::Error>),
}

impl CompileError {
    /// Returns the configuration the error concerns, if any.
    #[must_use]
    pub const fn configuration_id(&self) -> Option<&ConfigurationId> {
        match self {
            Self::Parse {
                configuration_id, ..
            }
            | Self::UnresolvedVariable {
                configuration_id, ..
            }
            | Self::CyclicVariable {
                configuration_id, ..
            }
            | Self::DuplicatePortName {
                configuration_id, ..
            }
            | Self::InvalidIdentifier {
                configuration_id, ..
            }
            | Self::InvalidPort {
                configuration_id, ..
            } => Some(configuration_id),
            Self::Serialize(_) => None,
        }
    }
}
