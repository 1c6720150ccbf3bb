//! Template registry service.

use crate::template::{
    domain::{ServiceTemplate, TemplateError, TemplateId},
    ports::{TemplateSource, TemplateSourceError},
};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{info, warn};

/// Service-level errors for template registry operations.
#[derive(Debug, Clone, Error)]
pub enum TemplateRegistryError {
    /// The template source failed.
    #[error(transparent)]
    Source(#[from] TemplateSourceError),

    /// Registry state could not be accessed.
    #[error("template registry state unavailable: {0}")]
    State(Arc<dyn std::error::Error + Send + Sync>),
}

impl TemplateRegistryError {
    fn state(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::State(Arc::new(err))
    }
}

/// Result type for template registry operations.
pub type TemplateRegistryResult<T> = Result<T, TemplateRegistryError>;

/// A record the registry refused to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedTemplate {
    /// Raw identifier as it appeared in the source.
    pub id: String,
    /// Validation failure.
    pub error: TemplateError,
}

/// Outcome of a registry refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Templates inserted or replaced.
    pub loaded: Vec<TemplateId>,
    /// Records that failed validation.
    pub rejected: Vec<RejectedTemplate>,
    /// Templates no longer published by the source but retained because
    /// configurations may still reference them.
    pub stale: Vec<TemplateId>,
}

/// Read-mostly catalogue of validated service templates.
///
/// Templates are shared as `Arc<ServiceTemplate>` so that resolution and
/// compilation can hold onto the version they started with while a refresh
/// replaces it.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: Arc<RwLock<HashMap<TemplateId, Arc<ServiceTemplate>>>>,
}

impl TemplateRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reloads templates from `source`.
    ///
    /// Valid records are upserted. Invalid records are reported and leave
    /// any previously loaded template with the same identifier in place.
    /// Templates missing from the source are retained and reported stale.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateRegistryError::Source`] when the source cannot be
    /// read; the registry is unchanged in that case.
    pub async fn refresh<S>(&self, source: &S) -> TemplateRegistryResult<RefreshReport>
    where
        S: TemplateSource + ?Sized,
    {
        let definitions = source.load().await?;
        let mut report = RefreshReport::default();
        let mut published = BTreeSet::new();
        let mut parsed = Vec::with_capacity(definitions.len());

        for definition in definitions {
            let raw_id = definition.id.clone();
            match ServiceTemplate::from_definition(definition) {
                Ok(template) => {
                    published.insert(template.id().clone());
                    parsed.push(template);
                }
                Err(error) => {
                    warn!(template_id = %raw_id, %error, "rejected template definition");
                    if let Ok(id) = TemplateId::new(raw_id.as_str()) {
                        published.insert(id);
                    }
                    report.rejected.push(RejectedTemplate { id: raw_id, error });
                }
            }
        }

        let mut templates = self
            .templates
            .write()
            .map_err(|err| TemplateRegistryError::state(std::io::Error::other(err.to_string())))?;

        for template in parsed {
            report.loaded.push(template.id().clone());
            templates.insert(template.id().clone(), Arc::new(template));
        }

        report.stale = templates
            .keys()
            .filter(|id| !published.contains(*id))
            .cloned()
            .collect();
        report.stale.sort();

        info!(
            loaded = report.loaded.len(),
            rejected = report.rejected.len(),
            stale = report.stale.len(),
            "template registry refreshed"
        );
        Ok(report)
    }

    /// Inserts or replaces a single template.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateRegistryError::State`] when lock acquisition fails.
    pub fn insert(&self, template: ServiceTemplate) -> TemplateRegistryResult<Arc<ServiceTemplate>> {
        let shared = Arc::new(template);
        let mut templates = self
            .templates
            .write()
            .map_err(|err| TemplateRegistryError::state(std::io::Error::other(err.to_string())))?;
        templates.insert(shared.id().clone(), Arc::clone(&shared));
        Ok(shared)
    }

    /// Returns the template with the given identifier, if loaded.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateRegistryError::State`] when lock acquisition fails.
    pub fn get(&self, id: &TemplateId) -> TemplateRegistryResult<Option<Arc<ServiceTemplate>>> {
        let templates = self
            .templates
            .read()
            .map_err(|err| TemplateRegistryError::state(std::io::Error::other(err.to_string())))?;
        Ok(templates.get(id).cloned())
    }

    /// Returns every loaded template ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateRegistryError::State`] when lock acquisition fails.
    pub fn list(&self) -> TemplateRegistryResult<Vec<Arc<ServiceTemplate>>> {
        let templates = self
            .templates
            .read()
            .map_err(|err| TemplateRegistryError::state(std::io::Error::other(err.to_string())))?;
        let mut listed: Vec<_> = templates.values().cloned().collect();
        listed.sort_by(|left, right| left.id().cmp(right.id()));
        Ok(listed)
    }
}
