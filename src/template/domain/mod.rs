//! Domain model for service templates.
//!
//! A template describes a deployable service abstractly: image reference,
//! published ports, env vars with defaults or placeholders, capabilities it
//! provides and requires, volumes and exposure. Variable tokens embedded in
//! any of these values are scanned by [`variables`].

mod definition;
mod error;
mod ids;
mod image;
mod port;
mod template;
pub mod variables;

pub use definition::{PortDefinition, ProvidedDefinition, RequirementDefinition, TemplateDefinition};
pub use error::TemplateError;
pub use ids::TemplateId;
pub use image::resolve_image_variables;
pub use port::{ExposureMode, HostPortError, PortDeclaration, PortProtocol, VolumeDeclaration};
pub use template::ServiceTemplate;
