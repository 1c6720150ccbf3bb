//! Backend identifier sanitization.

/// Longest object name a cluster accepts.
pub const MAX_OBJECT_NAME_LENGTH: usize = 63;

/// Longest port name a cluster accepts.
pub const MAX_PORT_NAME_LENGTH: usize = 15;

/// Lowercases `raw`, replaces every character outside `[a-z0-9-]` with `-`
/// and trims leading and trailing dashes.
///
/// Returns `None` when nothing remains or the result exceeds `max_length`.
///
/// # Examples
///
/// ```
/// use deckhand::compiler::sanitize_identifier;
///
/// assert_eq!(
///     sanitize_identifier("openmemory:mem0-UI", 63).as_deref(),
///     Some("openmemory-mem0-ui")
/// );
/// assert_eq!(sanitize_identifier("::", 63), None);
/// ```
#[must_use]
pub fn sanitize_identifier(raw: &str, max_length: usize) -> Option<String> {
    let replaced: String = raw
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|character| {
            if character.is_ascii_lowercase() || character.is_ascii_digit() || character == '-' {
                character
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = replaced.trim_matches('-');
    (!trimmed.is_empty() && trimmed.len() <= max_length).then(|| trimmed.to_owned())
}
