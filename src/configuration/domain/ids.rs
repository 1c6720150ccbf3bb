//! Identifier type for service configurations.

use super::ConfigurationDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operator-chosen identifier of a service configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConfigurationId(String);

impl ConfigurationId {
    /// Creates a validated configuration identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationDomainError`] when the value is empty or
    /// contains whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, ConfigurationDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ConfigurationDomainError::EmptyConfigurationId);
        }
        if trimmed
            .chars()
            .any(|character| character.is_whitespace() || character.is_control())
        {
            return Err(ConfigurationDomainError::InvalidConfigurationId(
                trimmed.to_owned(),
            ));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ConfigurationId {
    type Error = ConfigurationDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConfigurationId> for String {
    fn from(value: ConfigurationId) -> Self {
        value.0
    }
}

impl AsRef<str> for ConfigurationId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ConfigurationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
