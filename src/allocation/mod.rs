//! Port allocator and conflict resolver.
//!
//! Before a deploy, checks every host port a configuration would bind
//! against the ports already in use in its port space and suggests the
//! nearest free alternative for each collision.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - The allocator in [`services`]

pub mod domain;
pub mod ports;
pub mod services;
