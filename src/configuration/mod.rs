//! Service configuration store.
//!
//! Configurations are concrete instances of templates: an override tree, a
//! deployment target and the deployment state machine. The store also holds
//! the layered shared settings tree that `${a.b}` references resolve
//! against, and the per-configuration operation guards that serialize
//! mutations. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
