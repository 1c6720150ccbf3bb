//! In-memory template source.

use crate::template::{
    domain::TemplateDefinition,
    ports::{TemplateSource, TemplateSourceError, TemplateSourceResult},
};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// Template source backed by a mutable list of records.
///
/// Replacing the records between refreshes models a catalogue changing on
/// disk.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplateSource {
    definitions: Arc<RwLock<Vec<TemplateDefinition>>>,
}

impl InMemoryTemplateSource {
    /// Creates a source publishing the given records.
    #[must_use]
    pub fn new(definitions: Vec<TemplateDefinition>) -> Self {
        Self {
            definitions: Arc::new(RwLock::new(definitions)),
        }
    }

    /// Creates a source from a JSON array of template records.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateSourceError::Decode`] when the JSON does not
    /// describe a list of records.
    pub fn from_json(json: &str) -> TemplateSourceResult<Self> {
        let definitions = serde_json::from_str(json).map_err(TemplateSourceError::decode)?;
        Ok(Self::new(definitions))
    }

    /// Replaces every published record.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateSourceError::Unavailable`] when lock acquisition
    /// fails.
    pub fn replace(&self, definitions: Vec<TemplateDefinition>) -> TemplateSourceResult<()> {
        let mut guard = self.definitions.write().map_err(|err| {
            TemplateSourceError::unavailable(std::io::Error::other(err.to_string()))
        })?;
        *guard = definitions;
        Ok(())
    }
}

#[async_trait]
impl TemplateSource for InMemoryTemplateSource {
    async fn load(&self) -> TemplateSourceResult<Vec<TemplateDefinition>> {
        let guard = self.definitions.read().map_err(|err| {
            TemplateSourceError::unavailable(std::io::Error::other(err.to_string()))
        })?;
        Ok(guard.clone())
    }
}
