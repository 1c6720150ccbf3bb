//! Capability resolver.
//!
//! Wires each configuration's required capabilities to the provider the
//! operator selected, materializing the provider's exports as env vars in
//! the consumer. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The resolver in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
