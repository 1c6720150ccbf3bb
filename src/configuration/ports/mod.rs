//! Port contracts for configuration persistence.

mod repository;

pub use repository::{
    ConfigurationRepository, ConfigurationRepositoryError, ConfigurationRepositoryResult,
};
