//! Engine settings.
//!
//! Settings load from JSON with every field optional, then take overrides
//! from `DECKHAND_*` environment variables read through an
//! [`EnvironmentSource`].

use crate::compiler::RestartPolicy;
use crate::template::ports::EnvironmentSource;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Prefix of environment variables that override settings.
pub const ENV_PREFIX: &str = "DECKHAND_";

/// Errors returned while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The JSON document is malformed.
    #[error("invalid settings document: {0}")]
    Json(#[from] serde_json::Error),

    /// An environment override does not parse.
    #[error("invalid value '{value}' for {name}")]
    InvalidValue {
        /// Environment variable name.
        name: String,
        /// Offending value.
        value: String,
    },
}

/// Tunables for port allocation, backend calls and readiness waits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// How far above a conflicting port to look for a free one.
    pub port_scan_window: u16,
    /// Upper bound on any single backend call, in milliseconds.
    pub backend_call_timeout_ms: u64,
    /// How long a container may take to report running, in milliseconds.
    pub container_start_timeout_ms: u64,
    /// How long a cluster rollout may take to become ready, in milliseconds.
    pub rollout_timeout_ms: u64,
    /// Interval between readiness polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Attempts per submit before a transient failure is final.
    pub submit_attempts: u32,
    /// First retry delay, doubled per attempt, in milliseconds.
    pub backoff_base_ms: u64,
    /// Restart policy written into container artifacts.
    pub restart_policy: RestartPolicy,
    /// Value of the managed-by label on every artifact.
    pub managed_by: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            port_scan_window: 100,
            backend_call_timeout_ms: 30_000,
            container_start_timeout_ms: 60_000,
            rollout_timeout_ms: 300_000,
            poll_interval_ms: 1_000,
            submit_attempts: 3,
            backoff_base_ms: 500,
            restart_policy: RestartPolicy::UnlessStopped,
            managed_by: "deckhand".to_owned(),
        }
    }
}

impl EngineSettings {
    /// Settings with millisecond timings for tests.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            backend_call_timeout_ms: 250,
            container_start_timeout_ms: 300,
            rollout_timeout_ms: 300,
            poll_interval_ms: 10,
            backoff_base_ms: 5,
            ..Self::default()
        }
    }

    /// Parses settings from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Json`] for malformed documents.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Applies `DECKHAND_*` overrides, such as
    /// `DECKHAND_PORT_SCAN_WINDOW=200`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidValue`] when an override does not
    /// parse.
    pub fn with_env_overrides(
        mut self,
        environment: &dyn EnvironmentSource,
    ) -> Result<Self, SettingsError> {
        override_from(environment, "PORT_SCAN_WINDOW", &mut self.port_scan_window)?;
        override_from(environment, "BACKEND_CALL_TIMEOUT_MS", &mut self.backend_call_timeout_ms)?;
        override_from(
            environment,
            "CONTAINER_START_TIMEOUT_MS",
            &mut self.container_start_timeout_ms,
        )?;
        override_from(environment, "ROLLOUT_TIMEOUT_MS", &mut self.rollout_timeout_ms)?;
        override_from(environment, "POLL_INTERVAL_MS", &mut self.poll_interval_ms)?;
        override_from(environment, "SUBMIT_ATTEMPTS", &mut self.submit_attempts)?;
        override_from(environment, "BACKOFF_BASE_MS", &mut self.backoff_base_ms)?;
        override_from(environment, "RESTART_POLICY", &mut self.restart_policy)?;
        if let Some(managed_by) = environment.get(&format!("{ENV_PREFIX}MANAGED_BY")) {
            self.managed_by = managed_by;
        }
        Ok(self)
    }

    /// Returns the per-call backend timeout.
    #[must_use]
    pub const fn backend_call_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_call_timeout_ms)
    }

    /// Returns the container readiness timeout.
    #[must_use]
    pub const fn container_start_timeout(&self) -> Duration {
        Duration::from_millis(self.container_start_timeout_ms)
    }

    /// Returns the cluster rollout timeout.
    #[must_use]
    pub const fn rollout_timeout(&self) -> Duration {
        Duration::from_millis(self.rollout_timeout_ms)
    }

    /// Returns the readiness poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the delay before retry number `attempt` (starting at 1).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

fn override_from<T: FromStr>(
    environment: &dyn EnvironmentSource,
    key: &str,
    target: &mut T,
) -> Result<(), SettingsError> {
    let name = format!("{ENV_PREFIX}{key}");
    let Some(value) = environment.get(&name) else {
        return Ok(());
    };
    *target = value
        .trim()
        .parse()
        .map_err(|_| SettingsError::InvalidValue { name, value: value.clone() })?;
    Ok(())
}
