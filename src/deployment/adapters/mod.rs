//! Adapter implementations of the deployment ports.

mod cluster;
mod container;
pub mod memory;

pub use cluster::ClusterBackend;
pub use container::ContainerBackend;
