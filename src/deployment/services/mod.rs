//! Deployment services.

mod manager;
mod registry;

pub use manager::{DeploymentError, DeploymentManager, DeploymentResult};
pub use registry::BackendRegistry;
