//! Port contracts for loading templates and reading the process environment.

mod environment;
mod source;

pub use environment::EnvironmentSource;
pub use source::{TemplateSource, TemplateSourceError, TemplateSourceResult};
