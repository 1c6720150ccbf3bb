//! In-memory repository for service configurations.

use crate::configuration::{
    domain::{ConfigurationId, ServiceConfiguration},
    ports::{ConfigurationRepository, ConfigurationRepositoryError, ConfigurationRepositoryResult},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory configuration repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConfigurationRepository {
    state: Arc<RwLock<BTreeMap<ConfigurationId, ServiceConfiguration>>>,
}

impl InMemoryConfigurationRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigurationRepository for InMemoryConfigurationRepository {
    async fn insert(
        &self,
        configuration: &ServiceConfiguration,
    ) -> ConfigurationRepositoryResult<()> {
        let mut state = self.state.write().map_err(|err| {
            ConfigurationRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;

        if state.contains_key(configuration.id()) {
            return Err(ConfigurationRepositoryError::Duplicate(
                configuration.id().clone(),
            ));
        }

        state.insert(configuration.id().clone(), configuration.clone());
        Ok(())
    }

    async fn update(
        &self,
        configuration: &ServiceConfiguration,
    ) -> ConfigurationRepositoryResult<()> {
        let mut state = self.state.write().map_err(|err| {
            ConfigurationRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;

        let stored = state
            .get_mut(configuration.id())
            .ok_or_else(|| ConfigurationRepositoryError::NotFound(configuration.id().clone()))?;
        *stored = configuration.clone();
        Ok(())
    }

    async fn find(
        &self,
        id: &ConfigurationId,
    ) -> ConfigurationRepositoryResult<Option<ServiceConfiguration>> {
        let state = self.state.read().map_err(|err| {
            ConfigurationRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.get(id).cloned())
    }

    async fn list(&self) -> ConfigurationRepositoryResult<Vec<ServiceConfiguration>> {
        let state = self.state.read().map_err(|err| {
            ConfigurationRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.values().cloned().collect())
    }

    async fn delete(&self, id: &ConfigurationId) -> ConfigurationRepositoryResult<bool> {
        let mut state = self.state.write().map_err(|err| {
            ConfigurationRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.remove(id).is_some())
    }
}
