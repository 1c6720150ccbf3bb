//! Adapter implementations for configuration ports.

pub mod memory;

pub use memory::InMemoryConfigurationRepository;
