//! Port contracts for observing live port bindings.

mod bindings;

pub use bindings::{LiveBindingsError, LiveBindingsResult, LivePortBindings};
