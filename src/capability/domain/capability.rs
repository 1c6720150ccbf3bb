//! Capability names, requirements and provisions.

use super::CapabilityDomainError;
use crate::configuration::domain::ConfigurationId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of an abstract capability, such as `llm` or `vector-store`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CapabilityName(String);

impl CapabilityName {
    /// Creates a validated capability name.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityDomainError`] when the name is empty or contains
    /// characters outside `[a-z0-9_.-]`.
    pub fn new(value: impl Into<String>) -> Result<Self, CapabilityDomainError> {
        let raw = value.into();
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(CapabilityDomainError::EmptyName);
        }
        if !normalized.chars().all(|character| {
            character.is_ascii_lowercase()
                || character.is_ascii_digit()
                || matches!(character, '_' | '.' | '-')
        }) {
            return Err(CapabilityDomainError::InvalidName(raw));
        }
        Ok(Self(normalized))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CapabilityName {
    type Error = CapabilityDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CapabilityName> for String {
    fn from(value: CapabilityName) -> Self {
        value.0
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A capability a template needs from some provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRequirement {
    name: CapabilityName,
    optional: bool,
}

impl CapabilityRequirement {
    /// Creates a requirement that must resolve before deploy.
    #[must_use]
    pub const fn mandatory(name: CapabilityName) -> Self {
        Self {
            name,
            optional: false,
        }
    }

    /// Creates a requirement that is skipped when no provider is selected.
    #[must_use]
    pub const fn optional(name: CapabilityName) -> Self {
        Self {
            name,
            optional: true,
        }
    }

    /// Returns the capability name.
    #[must_use]
    pub const fn name(&self) -> &CapabilityName {
        &self.name
    }

    /// Returns whether deploy may proceed without a provider.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }
}

/// A capability a template offers to consumers.
///
/// Exports map a consumer env var name to a value expression evaluated
/// against the provider's own resolved env, for example
/// `LLM_BASE_URL = "http://${PROVIDER_ID}:${PORT:-8000}/v1"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidedCapability {
    name: CapabilityName,
    exports: BTreeMap<String, String>,
}

impl ProvidedCapability {
    /// Creates a provision with no exports.
    #[must_use]
    pub const fn new(name: CapabilityName) -> Self {
        Self {
            name,
            exports: BTreeMap::new(),
        }
    }

    /// Adds one export.
    #[must_use]
    pub fn with_export(mut self, env_var: impl Into<String>, expression: impl Into<String>) -> Self {
        self.exports.insert(env_var.into(), expression.into());
        self
    }

    /// Replaces the exports.
    #[must_use]
    pub fn with_exports(mut self, exports: BTreeMap<String, String>) -> Self {
        self.exports = exports;
        self
    }

    /// Returns the capability name.
    #[must_use]
    pub const fn name(&self) -> &CapabilityName {
        &self.name
    }

    /// Returns the export expressions.
    #[must_use]
    pub const fn exports(&self) -> &BTreeMap<String, String> {
        &self.exports
    }
}

/// A requirement of one configuration wired to a concrete provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityBinding {
    /// Consuming configuration.
    pub consumer: ConfigurationId,
    /// Capability being satisfied.
    pub capability: CapabilityName,
    /// Providing configuration.
    pub provider: ConfigurationId,
    /// Env vars the binding materializes in the consumer.
    pub env: BTreeMap<String, String>,
}

/// Operator's choice of provider for a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSelection {
    /// Capability name.
    pub capability: CapabilityName,
    /// Selected provider configuration.
    pub provider: ConfigurationId,
}
