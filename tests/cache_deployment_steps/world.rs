//! Shared world state for cache deployment BDD scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use deckhand::capability::adapters::memory::InMemoryProviderSelections;
use deckhand::configuration::{
    adapters::memory::InMemoryConfigurationRepository,
    domain::ConfigurationId,
    services::ConfigurationStore,
};
use deckhand::deployment::{
    adapters::memory::{InMemoryBackendFactory, InMemoryContainerRuntime},
    services::{DeploymentError, DeploymentManager},
};
use deckhand::settings::EngineSettings;
use deckhand::template::{adapters::StaticEnvironment, services::TemplateRegistry};
use mockable::DefaultClock;
use rstest::fixture;

/// Manager type used by the BDD world.
pub type TestManager = DeploymentManager<
    InMemoryConfigurationRepository,
    InMemoryProviderSelections,
    InMemoryBackendFactory,
    DefaultClock,
>;

/// Scenario world for cache deployment behaviour tests.
pub struct CacheWorld {
    /// The manager under test.
    pub manager: TestManager,
    /// Factory owning the in-memory runtimes.
    pub factory: InMemoryBackendFactory,
    /// Last deploy failure per configuration.
    pub failures: HashMap<String, DeploymentError>,
}

impl CacheWorld {
    /// Creates a world with no templates loaded.
    #[must_use]
    pub fn new() -> Self {
        let store = ConfigurationStore::new(
            Arc::new(InMemoryConfigurationRepository::new()),
            TemplateRegistry::new(),
            Arc::new(DefaultClock),
        );
        let factory = InMemoryBackendFactory::new();
        let manager = DeploymentManager::new(
            store,
            Arc::new(InMemoryProviderSelections::new()),
            Arc::new(factory.clone()),
            Arc::new(StaticEnvironment::new()),
            Arc::new(EngineSettings::for_tests()),
        );
        Self {
            manager,
            factory,
            failures: HashMap::new(),
        }
    }

    /// Returns the local container runtime.
    pub fn local(&self) -> InMemoryContainerRuntime {
        self.factory.container_runtime("localhost")
    }
}

impl Default for CacheWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> CacheWorld {
    CacheWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// Parses a configuration identifier from step text.
pub fn configuration_id(raw: &str) -> Result<ConfigurationId, eyre::Report> {
    ConfigurationId::new(raw).map_err(|err| eyre::eyre!("invalid configuration id '{raw}': {err}"))
}
