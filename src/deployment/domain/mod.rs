//! Domain types for deployment observation.

mod observed;

pub use observed::{
    ClusterObjectKind, ClusterPortBinding, ContainerState, ExitInfo, ObservedState, PublishedPort,
};
