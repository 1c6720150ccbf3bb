//! Deployment backend port.

use crate::allocation::domain::PortBinding;
use crate::compiler::{Artifact, CompileError, ResolvedConfiguration, compile};
use crate::configuration::domain::{BackendKind, RuntimeRefs};
use crate::deployment::domain::ObservedState;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// A runtime that can run compiled artifacts for one port space.
///
/// One handle serves one host or one cluster context; see
/// [`super::BackendFactory`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeploymentBackend: Send + Sync {
    /// Returns the backend family.
    fn kind(&self) -> BackendKind;

    /// Compiles a resolved configuration into this backend's artifact.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] as [`compile`] does.
    fn compile(&self, resolved: &ResolvedConfiguration) -> Result<Artifact, CompileError> {
        compile(resolved, self.kind())
    }

    /// Creates the workload described by `artifact`.
    async fn submit(&self, artifact: &Artifact) -> BackendResult<RuntimeRefs>;

    /// Replaces a workload this backend previously created.
    async fn update(&self, refs: &RuntimeRefs, artifact: &Artifact) -> BackendResult<RuntimeRefs>;

    /// Observes a submitted workload.
    async fn status(&self, refs: &RuntimeRefs) -> BackendResult<ObservedState>;

    /// Removes a submitted workload. Removing a missing workload succeeds.
    async fn teardown(&self, refs: &RuntimeRefs) -> BackendResult<()>;

    /// Lists the host-facing ports currently bound in this port space.
    async fn bound_ports(&self) -> BackendResult<Vec<PortBinding>>;
}

/// Errors returned by deployment backends and their runtime ports.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend refused the artifact.
    #[error("backend rejected the artifact: {reason}")]
    Rejected {
        /// Backend-supplied reason.
        reason: String,
    },

    /// A host port is already bound.
    #[error("host port {port} could not be bound: {reason}")]
    PortBindFailed {
        /// The contested port.
        port: u16,
        /// Backend-supplied reason.
        reason: String,
    },

    /// A single backend call exceeded its time budget.
    #[error("backend call timed out after {after_ms} ms")]
    CallTimeout {
        /// Elapsed budget in milliseconds.
        after_ms: u64,
    },

    /// The backend asked the caller to slow down.
    #[error("backend is rate limiting requests: {reason}")]
    RateLimited {
        /// Backend-supplied reason.
        reason: String,
    },

    /// The artifact was compiled for another backend family.
    #[error("{artifact} artifact submitted to a {backend} backend")]
    KindMismatch {
        /// Family of the receiving backend.
        backend: BackendKind,
        /// Family the artifact was compiled for.
        artifact: BackendKind,
    },

    /// The runtime refs belong to another backend family.
    #[error("runtime refs {refs} do not belong to a {backend} backend")]
    ForeignRefs {
        /// Family of the receiving backend.
        backend: BackendKind,
        /// The refs.
        refs: RuntimeRefs,
    },

    /// The backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl BackendError {
    /// Wraps a connectivity failure.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }

    /// Creates a rejection.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Returns whether retrying the same call may succeed.
    ///
    /// Rate limiting, call timeouts and connectivity failures are transient.
    /// Everything else is deterministic.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CallTimeout { .. } | Self::RateLimited { .. } | Self::Unavailable(_)
        )
    }
}
