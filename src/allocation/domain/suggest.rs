//! Free-port suggestion.

use std::collections::BTreeSet;

/// Returns the lowest port above `declared` within `window` ports that is
/// not in `taken`.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use deckhand::allocation::domain::suggest_port;
///
/// let taken = BTreeSet::from([6379, 6380]);
/// assert_eq!(suggest_port(6379, &taken, 100), Some(6381));
/// ```
#[must_use]
pub fn suggest_port(declared: u16, taken: &BTreeSet<u16>, window: u16) -> Option<u16> {
    let last = declared.saturating_add(window);
    (declared.saturating_add(1)..=last)
        .filter(|candidate| *candidate > declared)
        .find(|candidate| !taken.contains(candidate))
}
