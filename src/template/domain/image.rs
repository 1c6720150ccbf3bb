//! Resolution of variable tokens embedded in image references.

use super::{TemplateError, TemplateId, variables::{self, VariableError}};
use std::collections::BTreeMap;

/// Resolves every `${NAME}` token in an image reference.
///
/// Each token is looked up in the instance overrides, then the process-wide
/// environment, then its embedded default. The function is pure: callers
/// pass an environment snapshot rather than the live process environment.
///
/// # Errors
///
/// Returns [`TemplateError::Parse`] for malformed tokens and
/// [`TemplateError::UnresolvedVariable`] when a token has no value from any
/// source.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use deckhand::template::domain::{TemplateId, resolve_image_variables};
///
/// let id = TemplateId::new("cache").expect("valid id");
/// let image = resolve_image_variables(
///     &id,
///     "registry/cache:${CACHE_TAG:-latest}",
///     &BTreeMap::new(),
///     &BTreeMap::new(),
/// )
/// .expect("image should resolve");
/// assert_eq!(image, "registry/cache:latest");
/// ```
pub fn resolve_image_variables(
    template_id: &TemplateId,
    image_expression: &str,
    overrides: &BTreeMap<String, String>,
    environment: &BTreeMap<String, String>,
) -> Result<String, TemplateError> {
    variables::substitute(image_expression, &[overrides, environment]).map_err(|error| match error {
        VariableError::Malformed { raw } => TemplateError::Parse {
            template_id: template_id.clone(),
            raw,
        },
        VariableError::Unresolved { name } => TemplateError::UnresolvedVariable {
            template_id: template_id.clone(),
            name,
        },
    })
}
