//! Step definitions for cache deployment scenarios.

pub mod world;

mod given;
mod then;
mod when;
