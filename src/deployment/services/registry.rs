//! Per-port-space backend handles.

use crate::allocation::{
    domain::PortBinding,
    ports::{LiveBindingsError, LiveBindingsResult, LivePortBindings},
};
use crate::configuration::domain::{DeploymentTarget, PortSpace};
use crate::deployment::ports::{BackendFactory, BackendResult, DeploymentBackend};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

type Handles = HashMap<PortSpace, Arc<dyn DeploymentBackend>>;

/// Owns one backend handle per port space.
///
/// Handles are created through the [`BackendFactory`] on first use and
/// reused until [`Self::invalidate`] drops them, for example after a
/// credential change.
pub struct BackendRegistry<F: BackendFactory> {
    factory: Arc<F>,
    handles: Arc<RwLock<Handles>>,
}

impl<F: BackendFactory> Clone for BackendRegistry<F> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            handles: Arc::clone(&self.handles),
        }
    }
}

impl<F: BackendFactory> BackendRegistry<F> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(factory: Arc<F>) -> Self {
        Self {
            factory,
            handles: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the handle serving `target`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns the factory's error when the handle cannot be created.
    pub fn backend_for(&self, target: &DeploymentTarget) -> BackendResult<Arc<dyn DeploymentBackend>> {
        let space = target.port_space();
        if let Some(handle) = self
            .handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&space)
        {
            return Ok(Arc::clone(handle));
        }

        let mut handles = self.handles.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = handles.get(&space) {
            return Ok(Arc::clone(handle));
        }
        let handle = self.factory.create(target)?;
        debug!(port_space = %space, kind = %handle.kind(), "backend handle created");
        handles.insert(space, Arc::clone(&handle));
        Ok(handle)
    }

    /// Drops the handle for `space`. Returns whether one existed.
    pub fn invalidate(&self, space: &PortSpace) -> bool {
        let removed = self
            .handles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(space)
            .is_some();
        if removed {
            info!(port_space = %space, "backend handle invalidated");
        }
        removed
    }

    /// Returns the port spaces with a live handle, sorted.
    #[must_use]
    pub fn port_spaces(&self) -> Vec<PortSpace> {
        let mut spaces: Vec<PortSpace> = self
            .handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        spaces.sort();
        spaces
    }
}

#[async_trait]
impl<F: BackendFactory> LivePortBindings for BackendRegistry<F> {
    async fn bound_ports(&self, target: &DeploymentTarget) -> LiveBindingsResult<Vec<PortBinding>> {
        let backend = self.backend_for(target).map_err(LiveBindingsError::backend)?;
        backend
            .bound_ports()
            .await
            .map_err(LiveBindingsError::backend)
    }
}
