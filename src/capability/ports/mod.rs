//! Port contracts for provider selections.

mod selection;

pub use selection::{
    ProviderSelectionError, ProviderSelectionRepository, ProviderSelectionResult,
};
