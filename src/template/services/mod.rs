//! Application services for the template catalogue.

mod registry;

pub use registry::{
    RefreshReport, RejectedTemplate, TemplateRegistry, TemplateRegistryError,
    TemplateRegistryResult,
};
