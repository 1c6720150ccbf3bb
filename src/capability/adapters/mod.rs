//! Adapter implementations for capability ports.

pub mod memory;

pub use memory::InMemoryProviderSelections;
