//! Identifier type for service templates.

use super::TemplateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a service template, as supplied by the template source.
///
/// Identifiers are free-form (`openmemory:mem0-ui` is valid); anything
/// derived from them for a backend goes through identifier sanitization in
/// the compiler.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TemplateId(String);

impl TemplateId {
    /// Creates a validated template identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the value is empty or contains
    /// whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, TemplateError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TemplateError::EmptyTemplateId);
        }
        if trimmed
            .chars()
            .any(|character| character.is_whitespace() || character.is_control())
        {
            return Err(TemplateError::InvalidTemplateId(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TemplateId {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TemplateId> for String {
    fn from(value: TemplateId) -> Self {
        value.0
    }
}

impl AsRef<str> for TemplateId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
