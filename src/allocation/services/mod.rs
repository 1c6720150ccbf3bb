//! Port allocation service.

mod allocator;

pub use allocator::{AllocationError, AllocationResult, PortAllocator, PortClaim, claimed_ports};
