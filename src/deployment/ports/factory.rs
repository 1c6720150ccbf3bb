//! Backend factory port.

use super::{BackendResult, DeploymentBackend};
use crate::configuration::domain::DeploymentTarget;
use std::sync::Arc;

/// Creates backend client handles.
///
/// Called once per port space; the returned handle serves every target in
/// that space until it is invalidated.
pub trait BackendFactory: Send + Sync {
    /// Creates a handle serving the port space of `target`.
    ///
    /// # Errors
    ///
    /// Returns [`super::BackendError`] when credentials or endpoints for the
    /// target are unavailable.
    fn create(&self, target: &DeploymentTarget) -> BackendResult<Arc<dyn DeploymentBackend>>;
}
