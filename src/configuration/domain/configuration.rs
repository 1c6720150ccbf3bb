//! Service configuration aggregate root.

use super::{
    ConfigNode, ConfigPath, ConfigTree, ConfigurationDomainError, ConfigurationId,
    DeploymentFailure, DeploymentRecord, DeploymentStatus, DeploymentTarget, FailureKind,
};
use crate::template::domain::TemplateId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Result of an override mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideOutcome {
    /// The stored value changed.
    Changed,
    /// The stored value already matched; nothing was touched.
    Unchanged,
}

impl OverrideOutcome {
    /// Returns whether the mutation changed anything.
    #[must_use]
    pub const fn is_changed(self) -> bool {
        matches!(self, Self::Changed)
    }
}

/// A concrete instance of a service template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    id: ConfigurationId,
    template_id: TemplateId,
    overrides: ConfigTree,
    target: DeploymentTarget,
    status: DeploymentStatus,
    record: Option<DeploymentRecord>,
    last_failure: Option<DeploymentFailure>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ServiceConfiguration {
    /// Creates a pending configuration with no overrides.
    #[must_use]
    pub fn new(
        id: ConfigurationId,
        template_id: TemplateId,
        target: DeploymentTarget,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            id,
            template_id,
            overrides: ConfigTree::new(),
            target,
            status: DeploymentStatus::Pending,
            record: None,
            last_failure: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Returns the configuration identifier.
    #[must_use]
    pub const fn id(&self) -> &ConfigurationId {
        &self.id
    }

    /// Returns the template this configuration instantiates.
    #[must_use]
    pub const fn template_id(&self) -> &TemplateId {
        &self.template_id
    }

    /// Returns the instance overrides.
    #[must_use]
    pub const fn overrides(&self) -> &ConfigTree {
        &self.overrides
    }

    /// Returns the deployment target.
    #[must_use]
    pub const fn target(&self) -> &DeploymentTarget {
        &self.target
    }

    /// Returns the deployment status.
    #[must_use]
    pub const fn status(&self) -> DeploymentStatus {
        self.status
    }

    /// Returns the record of the last successful deployment.
    #[must_use]
    pub const fn record(&self) -> Option<&DeploymentRecord> {
        self.record.as_ref()
    }

    /// Returns the last recorded failure.
    #[must_use]
    pub const fn last_failure(&self) -> Option<&DeploymentFailure> {
        self.last_failure.as_ref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the raw override at a top-level key.
    #[must_use]
    pub fn override_value(&self, key: &str) -> Option<&str> {
        self.overrides.text(key)
    }

    /// Sets an override. Setting the value already stored is a no-op that
    /// leaves `updated_at` untouched.
    pub fn set_override(
        &mut self,
        path: &ConfigPath,
        value: ConfigNode,
        clock: &impl Clock,
    ) -> OverrideOutcome {
        if self.overrides.set(path, value) {
            self.touch(clock);
            OverrideOutcome::Changed
        } else {
            OverrideOutcome::Unchanged
        }
    }

    /// Removes an override.
    pub fn remove_override(&mut self, path: &ConfigPath, clock: &impl Clock) -> OverrideOutcome {
        if self.overrides.remove(path).is_some() {
            self.touch(clock);
            OverrideOutcome::Changed
        } else {
            OverrideOutcome::Unchanged
        }
    }

    /// Points the configuration at a different target. The deployment
    /// record keeps naming the old target until the next deploy replaces it.
    pub fn retarget(&mut self, target: DeploymentTarget, clock: &impl Clock) -> OverrideOutcome {
        if self.target == target {
            return OverrideOutcome::Unchanged;
        }
        self.target = target;
        self.touch(clock);
        OverrideOutcome::Changed
    }

    /// Moves to `deploying`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationDomainError::InvalidLifecycleTransition`] when
    /// a deploy is already in flight.
    pub fn begin_deploy(&mut self, clock: &impl Clock) -> Result<(), ConfigurationDomainError> {
        self.transition_to(DeploymentStatus::Deploying)?;
        self.touch(clock);
        Ok(())
    }

    /// Records a confirmed deployment and moves to `running`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationDomainError::InvalidLifecycleTransition`] unless
    /// the configuration is deploying.
    pub fn mark_running(
        &mut self,
        record: DeploymentRecord,
        clock: &impl Clock,
    ) -> Result<(), ConfigurationDomainError> {
        self.transition_to(DeploymentStatus::Running)?;
        self.record = Some(record);
        self.last_failure = None;
        self.touch(clock);
        Ok(())
    }

    /// Records submitted backend handles without changing status, so a
    /// failed readiness wait still knows what to tear down.
    pub fn record_submission(&mut self, record: DeploymentRecord, clock: &impl Clock) {
        self.record = Some(record);
        self.touch(clock);
    }

    /// Records a failure and moves to `error`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationDomainError::InvalidLifecycleTransition`] unless
    /// the configuration is deploying or running.
    pub fn mark_failed(
        &mut self,
        kind: FailureKind,
        message: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), ConfigurationDomainError> {
        self.transition_to(DeploymentStatus::Error)?;
        self.last_failure = Some(DeploymentFailure {
            kind,
            message: message.into(),
            observed_at: clock.utc(),
        });
        self.touch(clock);
        Ok(())
    }

    /// Clears the deployment record and moves to `stopped`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationDomainError::InvalidLifecycleTransition`] unless
    /// the configuration is running or in error.
    pub fn mark_stopped(&mut self, clock: &impl Clock) -> Result<(), ConfigurationDomainError> {
        self.transition_to(DeploymentStatus::Stopped)?;
        self.record = None;
        self.touch(clock);
        Ok(())
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }

    fn transition_to(&mut self, target: DeploymentStatus) -> Result<(), ConfigurationDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(ConfigurationDomainError::InvalidLifecycleTransition {
                configuration_id: self.id.clone(),
                from: self.status.as_str().to_owned(),
                to: target.as_str().to_owned(),
            });
        }
        self.status = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::domain::RuntimeRefs;
    use mockable::DefaultClock;

    fn configuration() -> ServiceConfiguration {
        ServiceConfiguration::new(
            ConfigurationId::new("cache-1").expect("valid id"),
            TemplateId::new("cache").expect("valid id"),
            DeploymentTarget::Local,
            &DefaultClock,
        )
    }

    fn record() -> DeploymentRecord {
        DeploymentRecord {
            target: DeploymentTarget::Local,
            refs: RuntimeRefs::Container {
                container_id: "c-1".to_owned(),
                name: "cache-1".to_owned(),
            },
            fingerprint: "abc".to_owned(),
            bound_ports: vec![6379],
            deployed_at: Utc::now(),
        }
    }

    #[test]
    fn identical_override_leaves_updated_at_untouched() {
        let mut configuration = configuration();
        let port = ConfigPath::parse("CACHE_PORT").expect("valid path");

        let first = configuration.set_override(&port, ConfigNode::from(6380_u16), &DefaultClock);
        let touched_at = configuration.updated_at();
        let second = configuration.set_override(&port, ConfigNode::from("6380"), &DefaultClock);

        assert_eq!(first, OverrideOutcome::Changed);
        assert_eq!(second, OverrideOutcome::Unchanged);
        assert_eq!(configuration.updated_at(), touched_at);
        assert_eq!(configuration.override_value("CACHE_PORT"), Some("6380"));
    }

    #[test]
    fn deploy_cycle_moves_through_states() {
        let mut configuration = configuration();

        configuration
            .begin_deploy(&DefaultClock)
            .expect("pending can deploy");
        configuration
            .mark_running(record(), &DefaultClock)
            .expect("deploying can run");
        configuration
            .mark_stopped(&DefaultClock)
            .expect("running can stop");

        assert_eq!(configuration.status(), DeploymentStatus::Stopped);
        assert!(configuration.record().is_none());
    }

    #[test]
    fn cannot_run_without_deploying() {
        let mut configuration = configuration();

        let result = configuration.mark_running(record(), &DefaultClock);

        assert!(matches!(
            result,
            Err(ConfigurationDomainError::InvalidLifecycleTransition { .. })
        ));
    }

    #[test]
    fn failure_is_recorded_and_cleared_by_next_success() {
        let mut configuration = configuration();

        configuration
            .begin_deploy(&DefaultClock)
            .expect("pending can deploy");
        configuration
            .mark_failed(FailureKind::BackendTimeout, "not ready", &DefaultClock)
            .expect("deploying can fail");
        assert_eq!(
            configuration.last_failure().map(|failure| failure.kind),
            Some(FailureKind::BackendTimeout)
        );

        configuration
            .begin_deploy(&DefaultClock)
            .expect("error can redeploy");
        configuration
            .mark_running(record(), &DefaultClock)
            .expect("deploying can run");
        assert!(configuration.last_failure().is_none());
    }
}
