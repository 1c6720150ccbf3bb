//! Error types for capability domain validation.

use thiserror::Error;

/// Errors returned while constructing capability values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityDomainError {
    /// The capability name is empty after trimming.
    #[error("capability name must not be empty")]
    EmptyName,

    /// The capability name contains characters outside `[a-z0-9_.-]`.
    #[error("capability name '{0}' contains invalid characters")]
    InvalidName(String),
}
