//! Port contracts for deployment backends.

mod backend;
mod cluster;
mod factory;
mod runtime;

#[cfg(test)]
pub use backend::MockDeploymentBackend;
pub use backend::{BackendError, BackendResult, DeploymentBackend};
pub use cluster::ClusterApi;
pub use factory::BackendFactory;
#[cfg(test)]
pub use runtime::MockContainerRuntime;
pub use runtime::ContainerRuntime;
