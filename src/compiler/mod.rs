//! Deployment compiler.
//!
//! Translates a [`ResolvedConfiguration`] into the artifact a backend
//! submits: a single container for container runtimes, or a namespace-scoped
//! set of config, secret, workload and exposure objects for clusters.
//!
//! Compilation is pure. Every variable is resolved or the compile fails;
//! nothing is ever substituted as blank.

mod artifact;
mod compile;
mod error;
mod identifiers;
mod resolved;
mod secrets;

pub use artifact::{
    Artifact, ClusterArtifactSet, ConfigObject, ContainerArtifact, ExposedPort,
    ExposureDescriptor, HealthProbe, NamedPort, ParseRestartPolicyError, PortMapping,
    RestartPolicy, SecretObject, VolumeMount, Workload,
};
pub use compile::{compile, fingerprint};
pub use error::CompileError;
pub use identifiers::{MAX_OBJECT_NAME_LENGTH, MAX_PORT_NAME_LENGTH, sanitize_identifier};
pub use resolved::ResolvedConfiguration;
pub use secrets::is_secret_name;
