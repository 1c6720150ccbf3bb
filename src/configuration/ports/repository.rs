//! Repository port for service configurations.

use crate::configuration::domain::{ConfigurationId, ServiceConfiguration};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for configuration repository operations.
pub type ConfigurationRepositoryResult<T> = Result<T, ConfigurationRepositoryError>;

/// Persistence contract for service configurations.
#[async_trait]
pub trait ConfigurationRepository: Send + Sync {
    /// Stores a new configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationRepositoryError::Duplicate`] when the
    /// identifier is already taken.
    async fn insert(&self, configuration: &ServiceConfiguration)
    -> ConfigurationRepositoryResult<()>;

    /// Replaces a stored configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationRepositoryError::NotFound`] when the
    /// configuration does not exist.
    async fn update(&self, configuration: &ServiceConfiguration)
    -> ConfigurationRepositoryResult<()>;

    /// Finds a configuration by identifier.
    async fn find(
        &self,
        id: &ConfigurationId,
    ) -> ConfigurationRepositoryResult<Option<ServiceConfiguration>>;

    /// Returns every stored configuration.
    async fn list(&self) -> ConfigurationRepositoryResult<Vec<ServiceConfiguration>>;

    /// Deletes a configuration, returning whether it existed.
    async fn delete(&self, id: &ConfigurationId) -> ConfigurationRepositoryResult<bool>;
}

/// Errors returned by configuration repository implementations.
#[derive(Debug, Clone, Error)]
pub enum ConfigurationRepositoryError {
    /// A configuration with the same identifier already exists.
    #[error("duplicate configuration identifier: {0}")]
    Duplicate(ConfigurationId),

    /// The configuration was not found.
    #[error("configuration not found: {0}")]
    NotFound(ConfigurationId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ConfigurationRepositoryError {
    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
