//! Adapter implementations for template and environment ports.

mod environment;
mod memory;

pub use environment::{ProcessEnvironment, StaticEnvironment};
pub use memory::InMemoryTemplateSource;
