//! Repository port for operator provider selections.

use crate::capability::domain::{CapabilityName, ProviderSelection};
use crate::configuration::domain::ConfigurationId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for provider selection operations.
pub type ProviderSelectionResult<T> = Result<T, ProviderSelectionError>;

/// Persistence contract for "capability X is served by configuration Y".
#[async_trait]
pub trait ProviderSelectionRepository: Send + Sync {
    /// Selects `provider` for `capability`, replacing any earlier choice.
    async fn select(
        &self,
        capability: &CapabilityName,
        provider: &ConfigurationId,
    ) -> ProviderSelectionResult<()>;

    /// Returns the selected provider for `capability`.
    async fn selected(
        &self,
        capability: &CapabilityName,
    ) -> ProviderSelectionResult<Option<ConfigurationId>>;

    /// Clears the selection for `capability`, returning whether one existed.
    async fn clear(&self, capability: &CapabilityName) -> ProviderSelectionResult<bool>;

    /// Clears every selection pointing at `provider`, returning the
    /// capabilities that lost their provider.
    async fn release_provider(
        &self,
        provider: &ConfigurationId,
    ) -> ProviderSelectionResult<Vec<CapabilityName>>;

    /// Returns every selection ordered by capability name.
    async fn list(&self) -> ProviderSelectionResult<Vec<ProviderSelection>>;
}

/// Errors returned by provider selection repositories.
#[derive(Debug, Clone, Error)]
pub enum ProviderSelectionError {
    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ProviderSelectionError {
    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
