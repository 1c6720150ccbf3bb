//! Shared fixtures for in-memory deployment tests.

use std::sync::Arc;

use deckhand::capability::{
    adapters::memory::InMemoryProviderSelections,
    domain::{CapabilityName, CapabilityRequirement, ProvidedCapability},
};
use deckhand::configuration::{
    adapters::memory::InMemoryConfigurationRepository,
    domain::{ConfigurationId, DeploymentTarget},
    services::{ConfigurationStore, CreateConfigurationRequest},
};
use deckhand::deployment::{
    adapters::memory::{InMemoryBackendFactory, InMemoryClusterApi, InMemoryContainerRuntime},
    services::DeploymentManager,
};
use deckhand::settings::EngineSettings;
use deckhand::template::{
    adapters::StaticEnvironment,
    domain::{PortDeclaration, ServiceTemplate, TemplateId},
    services::TemplateRegistry,
};
use mockable::DefaultClock;
use rstest::fixture;

/// Manager wired over in-memory adapters.
pub type TestManager = DeploymentManager<
    InMemoryConfigurationRepository,
    InMemoryProviderSelections,
    InMemoryBackendFactory,
    DefaultClock,
>;

/// A manager plus handles on the runtimes behind it.
pub struct Harness {
    /// The manager under test.
    pub manager: TestManager,
    /// Factory owning the in-memory runtimes.
    pub factory: InMemoryBackendFactory,
}

impl Harness {
    /// Returns the local container runtime.
    pub fn local(&self) -> InMemoryContainerRuntime {
        self.factory.container_runtime("localhost")
    }

    /// Returns the cluster behind `context`.
    pub fn cluster(&self, context: &str) -> InMemoryClusterApi {
        self.factory.cluster_api(context)
    }

    /// Creates a configuration on the local target.
    pub async fn create(&self, id: &str, template: &str) -> ConfigurationId {
        self.create_on(id, template, DeploymentTarget::Local).await
    }

    /// Creates a configuration on `target`.
    pub async fn create_on(
        &self,
        id: &str,
        template: &str,
        target: DeploymentTarget,
    ) -> ConfigurationId {
        self.manager
            .store()
            .create(CreateConfigurationRequest::new(id, template).with_target(target))
            .await
            .expect("configuration created")
            .id()
            .clone()
    }
}

/// Builds a harness with `templates` loaded and `ambient` as the process
/// environment.
pub fn harness_with(templates: Vec<ServiceTemplate>, ambient: StaticEnvironment) -> Harness {
    let registry = TemplateRegistry::new();
    for template in templates {
        registry.insert(template).expect("template inserted");
    }
    let store = ConfigurationStore::new(
        Arc::new(InMemoryConfigurationRepository::new()),
        registry,
        Arc::new(DefaultClock),
    );
    let factory = InMemoryBackendFactory::new();
    let manager = DeploymentManager::new(
        store,
        Arc::new(InMemoryProviderSelections::new()),
        Arc::new(factory.clone()),
        Arc::new(ambient),
        Arc::new(EngineSettings::for_tests()),
    );
    Harness { manager, factory }
}

/// Harness with the cache, llm and agent templates and no ambient env.
#[fixture]
pub fn harness() -> Harness {
    harness_with(
        vec![cache_template(), llm_template(), agent_template()],
        StaticEnvironment::new(),
    )
}

/// Parses a configuration identifier.
pub fn id(raw: &str) -> ConfigurationId {
    ConfigurationId::new(raw).expect("valid configuration id")
}

fn template(id: &str, image: &str) -> ServiceTemplate {
    ServiceTemplate::new(TemplateId::new(id).expect("valid template id"), image)
        .expect("valid template")
}

fn capability(raw: &str) -> CapabilityName {
    CapabilityName::new(raw).expect("valid capability")
}

/// Key-value cache published on host port 6379.
pub fn cache_template() -> ServiceTemplate {
    template("cache", "registry/cache:${CACHE_TAG:-latest}")
        .with_port(PortDeclaration::new("6379", 6379))
        .with_env("CACHE_MAXMEMORY", "256mb")
}

/// Model server providing the `llm` capability.
pub fn llm_template() -> ServiceTemplate {
    template("llm", "registry/llm:1")
        .with_port(PortDeclaration::new("8080", 8080))
        .with_placeholder("LLM_API_KEY")
        .providing(
            ProvidedCapability::new(capability("llm"))
                .with_export("LLM_URL", "http://${PROVIDER_ID}:8080")
                .with_export("LLM_API_KEY", "${LLM_API_KEY}"),
        )
}

/// Agent that needs an `llm` provider.
pub fn agent_template() -> ServiceTemplate {
    template("agent", "registry/agent:1")
        .with_port(PortDeclaration::new("9000", 9000))
        .requiring(CapabilityRequirement::mandatory(capability("llm")))
}
