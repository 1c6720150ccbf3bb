//! Template source port.

use crate::template::domain::TemplateDefinition;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for template source operations.
pub type TemplateSourceResult<T> = Result<T, TemplateSourceError>;

/// Supplier of raw template records, such as a catalogue directory or a
/// remote index.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Loads every template record currently published by the source.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateSourceError`] when the source cannot be read.
    async fn load(&self) -> TemplateSourceResult<Vec<TemplateDefinition>>;
}

/// Errors returned by template source adapters.
#[derive(Debug, Clone, Error)]
pub enum TemplateSourceError {
    /// The source content could not be decoded.
    #[error("template source content is invalid: {0}")]
    Decode(Arc<dyn std::error::Error + Send + Sync>),

    /// The source could not be reached or read.
    #[error("template source unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl TemplateSourceError {
    /// Wraps a decoding failure.
    pub fn decode(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Decode(Arc::new(err))
    }

    /// Wraps an I/O or transport failure.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
