//! Template registry.
//!
//! Loads service templates from a [`ports::TemplateSource`], validates their
//! variable syntax, and serves them read-mostly to the rest of the engine.
//! The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The registry service in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
