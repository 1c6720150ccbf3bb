//! In-memory provider selection repository.

use crate::capability::{
    domain::{CapabilityName, ProviderSelection},
    ports::{ProviderSelectionError, ProviderSelectionRepository, ProviderSelectionResult},
};
use crate::configuration::domain::ConfigurationId;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory provider selections.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProviderSelections {
    state: Arc<RwLock<BTreeMap<CapabilityName, ConfigurationId>>>,
}

impl InMemoryProviderSelections {
    /// Creates an empty selection store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(message: String) -> ProviderSelectionError {
    ProviderSelectionError::persistence(std::io::Error::other(message))
}

#[async_trait]
impl ProviderSelectionRepository for InMemoryProviderSelections {
    async fn select(
        &self,
        capability: &CapabilityName,
        provider: &ConfigurationId,
    ) -> ProviderSelectionResult<()> {
        let mut state = self.state.write().map_err(|err| lock_error(err.to_string()))?;
        state.insert(capability.clone(), provider.clone());
        Ok(())
    }

    async fn selected(
        &self,
        capability: &CapabilityName,
    ) -> ProviderSelectionResult<Option<ConfigurationId>> {
        let state = self.state.read().map_err(|err| lock_error(err.to_string()))?;
        Ok(state.get(capability).cloned())
    }

    async fn clear(&self, capability: &CapabilityName) -> ProviderSelectionResult<bool> {
        let mut state = self.state.write().map_err(|err| lock_error(err.to_string()))?;
        Ok(state.remove(capability).is_some())
    }

    async fn release_provider(
        &self,
        provider: &ConfigurationId,
    ) -> ProviderSelectionResult<Vec<CapabilityName>> {
        let mut state = self.state.write().map_err(|err| lock_error(err.to_string()))?;
        let released: Vec<CapabilityName> = state
            .iter()
            .filter(|(_, selected)| *selected == provider)
            .map(|(capability, _)| capability.clone())
            .collect();
        for capability in &released {
            state.remove(capability);
        }
        Ok(released)
    }

    async fn list(&self) -> ProviderSelectionResult<Vec<ProviderSelection>> {
        let state = self.state.read().map_err(|err| lock_error(err.to_string()))?;
        Ok(state
            .iter()
            .map(|(capability, provider)| ProviderSelection {
                capability: capability.clone(),
                provider: provider.clone(),
            })
            .collect())
    }
}
