//! Capability resolution service.

mod resolver;

pub use resolver::{
    CapabilityError, CapabilityResolution, CapabilityResolver, CapabilityResult,
    PROVIDER_ID_VARIABLE,
};
