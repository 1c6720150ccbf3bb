//! Live port bindings port.

use crate::allocation::domain::PortBinding;
use crate::configuration::domain::DeploymentTarget;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for live binding queries.
pub type LiveBindingsResult<T> = Result<T, LiveBindingsError>;

/// Source of host ports currently bound in a target's port space,
/// including those held by processes the engine does not manage.
#[async_trait]
pub trait LivePortBindings: Send + Sync {
    /// Lists externally bound ports in the port space of `target`.
    async fn bound_ports(&self, target: &DeploymentTarget) -> LiveBindingsResult<Vec<PortBinding>>;
}

/// Error returned when live bindings cannot be observed.
#[derive(Debug, Clone, Error)]
#[error("live port bindings unavailable: {0}")]
pub struct LiveBindingsError(pub Arc<dyn std::error::Error + Send + Sync>);

impl LiveBindingsError {
    /// Wraps the underlying backend failure.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }
}
