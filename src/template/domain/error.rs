//! Error types for template parsing and variable resolution.

use super::TemplateId;
use thiserror::Error;

/// Errors returned while constructing or resolving service templates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// The template identifier is empty after trimming.
    #[error("template id must not be empty")]
    EmptyTemplateId,

    /// The template identifier contains whitespace or control characters.
    #[error("template id '{0}' must not contain whitespace or control characters")]
    InvalidTemplateId(String),

    /// The template image reference is empty.
    #[error("template '{template_id}' has an empty image reference")]
    EmptyImage {
        /// Template identifier.
        template_id: TemplateId,
    },

    /// A value, port or volume expression has malformed syntax.
    #[error("template '{template_id}' contains malformed syntax: '{raw}'")]
    Parse {
        /// Template identifier.
        template_id: TemplateId,
        /// The offending raw text.
        raw: String,
    },

    /// A variable token could not be resolved from any source.
    #[error("template '{template_id}' references unresolved variable '{name}'")]
    UnresolvedVariable {
        /// Template identifier.
        template_id: TemplateId,
        /// Name of the unresolved variable.
        name: String,
    },

    /// A capability name declared by the template is invalid.
    #[error("template '{template_id}' declares an invalid capability: {reason}")]
    InvalidCapability {
        /// Template identifier.
        template_id: TemplateId,
        /// Validation failure description.
        reason: String,
    },
}
