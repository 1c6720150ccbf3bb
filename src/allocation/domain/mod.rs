//! Domain model for host port allocation.

mod report;
mod suggest;

pub use report::{PortBinding, PortConflict, PortHolder, PreflightReport};
pub use suggest::suggest_port;
