//! Process environment port.

use std::collections::BTreeMap;

/// Point-in-time view of process-wide environment variables.
///
/// Variable resolution never reads the live environment directly; callers
/// take a snapshot through this port so resolution stays pure.
pub trait EnvironmentSource: Send + Sync {
    /// Returns every variable visible to the engine.
    fn snapshot(&self) -> BTreeMap<String, String>;

    /// Returns a single variable, if set.
    fn get(&self, name: &str) -> Option<String> {
        self.snapshot().remove(name)
    }
}
