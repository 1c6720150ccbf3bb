//! Application services for service configurations.

mod guards;
mod store;

pub use guards::{ConflictInProgress, OperationGuards, OperationPermit};
pub use store::{
    ConfigurationStore, ConfigurationStoreError, ConfigurationStoreResult,
    CreateConfigurationRequest, layered_tree,
};
