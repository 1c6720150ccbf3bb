//! Per-configuration operation guards.
//!
//! Every mutation of one configuration (override, retarget, delete, deploy,
//! undeploy) runs while holding that configuration's [`OperationPermit`].
//! Different configurations never contend.

use crate::configuration::domain::ConfigurationId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

/// Another operation on the same configuration is in flight.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("an operation on configuration '{0}' is already in progress")]
pub struct ConflictInProgress(pub ConfigurationId);

#[derive(Debug, Default)]
struct GuardSlot {
    lock: Arc<tokio::sync::Mutex<()>>,
    undeploy_claimed: AtomicBool,
}

/// Registry of per-configuration mutation locks.
#[derive(Debug, Clone, Default)]
pub struct OperationGuards {
    slots: Arc<Mutex<HashMap<ConfigurationId, Arc<GuardSlot>>>>,
}

impl OperationGuards {
    /// Creates an empty guard registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the permit for `id` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`ConflictInProgress`] when another operation holds it.
    pub fn try_begin(&self, id: &ConfigurationId) -> Result<OperationPermit, ConflictInProgress> {
        let slot = self.slot(id);
        let guard = Arc::clone(&slot.lock)
            .try_lock_owned()
            .map_err(|_| ConflictInProgress(id.clone()))?;
        Ok(OperationPermit {
            id: id.clone(),
            _guard: guard,
            undeploy_claim: None,
        })
    }

    /// Acquires the permit for an undeploy of `id`.
    ///
    /// Waits for an in-flight deploy or override to finish. A second
    /// undeploy while one is pending or running fails immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ConflictInProgress`] when another undeploy of `id` has
    /// already claimed the slot.
    pub async fn begin_undeploy(
        &self,
        id: &ConfigurationId,
    ) -> Result<OperationPermit, ConflictInProgress> {
        let slot = self.slot(id);
        if slot.undeploy_claimed.swap(true, Ordering::AcqRel) {
            return Err(ConflictInProgress(id.clone()));
        }
        let claim = UndeployClaim(Arc::clone(&slot));
        let guard = Arc::clone(&slot.lock).lock_owned().await;
        Ok(OperationPermit {
            id: id.clone(),
            _guard: guard,
            undeploy_claim: Some(claim),
        })
    }

    /// Forgets the slot of a deleted configuration.
    pub fn forget(&self, id: &ConfigurationId) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    fn slot(&self, id: &ConfigurationId) -> Arc<GuardSlot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(id.clone()).or_default())
    }
}

/// Exclusive right to mutate one configuration. Released on drop.
#[derive(Debug)]
pub struct OperationPermit {
    id: ConfigurationId,
    _guard: OwnedMutexGuard<()>,
    undeploy_claim: Option<UndeployClaim>,
}

impl OperationPermit {
    /// Returns the configuration this permit covers.
    #[must_use]
    pub const fn id(&self) -> &ConfigurationId {
        &self.id
    }

    /// Returns whether the permit was taken for an undeploy.
    #[must_use]
    pub const fn is_undeploy(&self) -> bool {
        self.undeploy_claim.is_some()
    }
}

#[derive(Debug)]
struct UndeployClaim(Arc<GuardSlot>);

impl Drop for UndeployClaim {
    fn drop(&mut self) {
        self.0.undeploy_claimed.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn id(raw: &str) -> ConfigurationId {
        ConfigurationId::new(raw).expect("valid id")
    }

    #[test]
    fn second_try_begin_fails_fast() {
        let guards = OperationGuards::new();
        let _held = guards.try_begin(&id("cache-1")).expect("first permit");

        assert_eq!(
            guards.try_begin(&id("cache-1")).map(|_| ()),
            Err(ConflictInProgress(id("cache-1")))
        );
        assert!(guards.try_begin(&id("cache-2")).is_ok());
    }

    #[test]
    fn permit_is_released_on_drop() {
        let guards = OperationGuards::new();
        drop(guards.try_begin(&id("cache-1")).expect("first permit"));

        assert!(guards.try_begin(&id("cache-1")).is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn undeploy_waits_for_in_flight_operation() {
        let guards = OperationGuards::new();
        let held = guards.try_begin(&id("cache-1")).expect("deploy permit");

        let waiter = {
            let shared = guards.clone();
            tokio::spawn(async move {
                shared
                    .begin_undeploy(&id("cache-1"))
                    .await
                    .map(|permit| permit.is_undeploy())
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        let acquired = waiter.await.expect("task should join");
        assert_eq!(acquired, Ok(true));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_undeploy_fails_fast() {
        let guards = OperationGuards::new();
        let _first = guards
            .begin_undeploy(&id("cache-1"))
            .await
            .expect("first undeploy");

        let second = guards.begin_undeploy(&id("cache-1")).await;

        assert!(matches!(second, Err(ConflictInProgress(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn undeploy_claim_resets_after_release() {
        let guards = OperationGuards::new();
        drop(
            guards
                .begin_undeploy(&id("cache-1"))
                .await
                .expect("first undeploy"),
        );

        assert!(guards.begin_undeploy(&id("cache-1")).await.is_ok());
    }
}
