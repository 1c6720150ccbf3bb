//! In-memory runtime adapters for tests and deterministic local flows.

mod cluster;
mod factory;
mod runtime;

pub use cluster::InMemoryClusterApi;
pub use factory::InMemoryBackendFactory;
pub use runtime::InMemoryContainerRuntime;
