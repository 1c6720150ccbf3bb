//! Domain model for service configurations.
//!
//! A configuration instantiates one template with operator overrides and a
//! deployment target, and carries its deployment status and record. Settings
//! are held as typed [`ConfigTree`]s whose values may reference one another
//! through `${a.b}` paths, resolved by [`interpolate_env`].

mod configuration;
mod error;
mod ids;
mod interpolation;
mod record;
mod status;
mod target;
mod tree;

pub use configuration::{OverrideOutcome, ServiceConfiguration};
pub use error::{ConfigurationDomainError, ParseDeploymentStatusError};
pub use ids::ConfigurationId;
pub use interpolation::{ENV_ROOT, InterpolationError, interpolate_env, resolve_path};
pub use record::{DeploymentFailure, DeploymentRecord, FailureKind, RuntimeRefs};
pub use status::DeploymentStatus;
pub use target::{BackendKind, DeploymentTarget, PortSpace};
pub use tree::{ConfigNode, ConfigPath, ConfigText, ConfigTree, TextSegment};
