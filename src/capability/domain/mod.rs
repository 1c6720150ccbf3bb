//! Domain model for capability wiring.
//!
//! Templates declare the capabilities they provide and require by name.
//! The operator selects one provider configuration per capability; the
//! resolver turns those selections into [`CapabilityBinding`]s.

mod capability;
mod error;

pub use capability::{
    CapabilityBinding, CapabilityName, CapabilityRequirement, ProvidedCapability,
    ProviderSelection,
};
pub use error::CapabilityDomainError;
