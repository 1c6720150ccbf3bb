//! Deployment lifecycle orchestration.

use crate::allocation::{
    domain::PreflightReport,
    services::{AllocationError, PortAllocator},
};
use crate::capability::{
    domain::CapabilityName,
    ports::ProviderSelectionRepository,
    services::{CapabilityError, CapabilityResolver},
};
use crate::compiler::{Artifact, CompileError, ResolvedConfiguration, fingerprint};
use crate::configuration::{
    domain::{
        BackendKind, ConfigurationDomainError, ConfigurationId, DeploymentRecord,
        DeploymentStatus, FailureKind, RuntimeRefs, ServiceConfiguration,
    },
    ports::ConfigurationRepository,
    services::{ConfigurationStore, ConfigurationStoreError, ConflictInProgress, OperationPermit},
};
use crate::deployment::{
    domain::{ExitInfo, ObservedState},
    ports::{BackendError, BackendFactory, BackendResult, DeploymentBackend},
    services::BackendRegistry,
};
use crate::settings::EngineSettings;
use crate::template::ports::EnvironmentSource;
use mockable::Clock;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

/// Errors returned by deployment operations.
///
/// Every variant names the configuration it concerns, either directly or
/// through the wrapped error.
#[derive(Debug, Error)]
pub enum DeploymentError {
    /// Configuration lookup or persistence failed.
    #[error(transparent)]
    Store(#[from] ConfigurationStoreError),

    /// Capability resolution failed.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Preflight could not run.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// The configuration does not compile.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// A lifecycle transition was refused.
    #[error(transparent)]
    Domain(#[from] ConfigurationDomainError),

    /// Another operation on the configuration is in flight.
    #[error(transparent)]
    Conflict(#[from] ConflictInProgress),

    /// Preflight found host ports already in use.
    #[error("configuration {configuration_id} has {} port conflict(s)", .report.conflicts.len())]
    PortConflict {
        /// Configuration identifier.
        configuration_id: ConfigurationId,
        /// Conflicts with suggested remediations.
        report: Box<PreflightReport>,
    },

    /// The workload did not become ready in time.
    #[error("configuration {configuration_id} did not become ready: {last_condition}")]
    BackendTimeout {
        /// Configuration identifier.
        configuration_id: ConfigurationId,
        /// Last condition the backend reported.
        last_condition: String,
    },

    /// The workload exited.
    #[error("configuration {configuration_id} {exit}")]
    RuntimeCrash {
        /// Configuration identifier.
        configuration_id: ConfigurationId,
        /// Exit details.
        exit: ExitInfo,
    },

    /// The backend refused the artifact.
    #[error("configuration {configuration_id} was rejected: {reason}")]
    BackendRejected {
        /// Configuration identifier.
        configuration_id: ConfigurationId,
        /// Backend-supplied reason.
        reason: String,
    },

    /// A host port was taken between preflight and submit.
    #[error("configuration {configuration_id} could not bind host port {port}: {reason}")]
    PortBindFailed {
        /// Configuration identifier.
        configuration_id: ConfigurationId,
        /// The contested port.
        port: u16,
        /// Backend-supplied reason.
        reason: String,
    },

    /// Any other backend failure.
    #[error("configuration {configuration_id}: {source}")]
    Backend {
        /// Configuration identifier.
        configuration_id: ConfigurationId,
        /// Backend failure.
        source: BackendError,
    },
}

/// Result type for deployment operations.
pub type DeploymentResult<T> = Result<T, DeploymentError>;

fn backend_failure(id: &ConfigurationId, error: BackendError) -> (FailureKind, DeploymentError) {
    let configuration_id = id.clone();
    match error {
        BackendError::Rejected { reason } => (
            FailureKind::BackendRejected,
            DeploymentError::BackendRejected {
                configuration_id,
                reason,
            },
        ),
        BackendError::PortBindFailed { port, reason } => (
            FailureKind::PortBindFailed,
            DeploymentError::PortBindFailed {
                configuration_id,
                port,
                reason,
            },
        ),
        source => (
            FailureKind::Backend,
            DeploymentError::Backend {
                configuration_id,
                source,
            },
        ),
    }
}

enum Readiness {
    Ready,
    TimedOut { last_condition: String },
    Crashed(ExitInfo),
    Failed(BackendError),
}

/// Drives configurations through deploy, undeploy and crash detection.
///
/// One operation per configuration runs at a time: a second deploy fails
/// fast with [`ConflictInProgress`], undeploy waits for an in-flight
/// deploy, and different configurations proceed in parallel. Backend calls
/// and readiness waits are bounded by [`EngineSettings`].
pub struct DeploymentManager<R, P, F, C>
where
    R: ConfigurationRepository,
    P: ProviderSelectionRepository,
    F: BackendFactory,
    C: Clock + Send + Sync,
{
    store: ConfigurationStore<R, C>,
    resolver: CapabilityResolver<R, P, C>,
    allocator: PortAllocator<R, BackendRegistry<F>, C>,
    backends: BackendRegistry<F>,
    environment: Arc<dyn EnvironmentSource>,
    settings: Arc<EngineSettings>,
}

impl<R, P, F, C> DeploymentManager<R, P, F, C>
where
    R: ConfigurationRepository,
    P: ProviderSelectionRepository,
    F: BackendFactory,
    C: Clock + Send + Sync,
{
    /// Wires a manager over the store, provider selections and backend
    /// factory.
    #[must_use]
    pub fn new(
        store: ConfigurationStore<R, C>,
        selections: Arc<P>,
        factory: Arc<F>,
        environment: Arc<dyn EnvironmentSource>,
        settings: Arc<EngineSettings>,
    ) -> Self {
        let backends = BackendRegistry::new(factory);
        let resolver = CapabilityResolver::new(store.clone(), selections);
        let allocator = PortAllocator::new(
            store.clone(),
            Arc::new(backends.clone()),
            Arc::clone(&environment),
            Arc::clone(&settings),
        );
        Self {
            store,
            resolver,
            allocator,
            backends,
            environment,
            settings,
        }
    }

    /// Returns the configuration store.
    #[must_use]
    pub const fn store(&self) -> &ConfigurationStore<R, C> {
        &self.store
    }

    /// Returns the capability resolver.
    #[must_use]
    pub const fn resolver(&self) -> &CapabilityResolver<R, P, C> {
        &self.resolver
    }

    /// Returns the backend registry.
    #[must_use]
    pub const fn backends(&self) -> &BackendRegistry<F> {
        &self.backends
    }

    /// Checks the host ports of a stored configuration.
    ///
    /// # Errors
    ///
    /// Returns lookup, interpolation or live binding errors.
    pub async fn preflight(&self, id: &ConfigurationId) -> DeploymentResult<PreflightReport> {
        Ok(self.allocator.preflight(id).await?)
    }

    /// Deploys a configuration to its target.
    ///
    /// Resolves capabilities, compiles, runs preflight and submits, then
    /// waits for the workload to become ready. Redeploying an unchanged
    /// running configuration is a no-op. When the target changed since the
    /// last deploy, the old deployment is torn down first.
    ///
    /// # Errors
    ///
    /// Deterministic failures (unresolved capabilities, compile errors,
    /// port conflicts) return before any backend call. Backend failures
    /// move the configuration to `error` and return
    /// [`DeploymentError::BackendTimeout`],
    /// [`DeploymentError::RuntimeCrash`],
    /// [`DeploymentError::BackendRejected`],
    /// [`DeploymentError::PortBindFailed`] or [`DeploymentError::Backend`].
    pub async fn deploy(&self, id: &ConfigurationId) -> DeploymentResult<ServiceConfiguration> {
        let permit = self.store.guards().try_begin(id)?;
        let mut configuration = self.store.get(id).await?;
        let template = self.store.template_of(&configuration)?;
        let resolution = self.resolver.resolve(&configuration).await?;
        let backend = self
            .backends
            .backend_for(configuration.target())
            .map_err(|source| DeploymentError::Backend {
                configuration_id: id.clone(),
                source,
            })?;

        let overrides = configuration
            .overrides()
            .top_level_values()
            .filter_map(|(key, _)| resolution.env.get_key_value(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let resolved = ResolvedConfiguration {
            configuration_id: id.clone(),
            template: Arc::clone(&template),
            target: configuration.target().clone(),
            overrides,
            env: resolution.env,
            bindings: resolution.bindings,
            ambient: self.environment.snapshot(),
            restart_policy: self.settings.restart_policy,
            managed_by: self.settings.managed_by.clone(),
        };
        let artifact = backend.compile(&resolved)?;
        let fingerprint = fingerprint(&artifact)?;

        let unchanged = configuration.status() == DeploymentStatus::Running
            && configuration.record().is_some_and(|record| {
                record.fingerprint == fingerprint && &record.target == configuration.target()
            });
        if unchanged {
            info!(configuration_id = %id, "artifact unchanged; deploy skipped");
            return Ok(configuration);
        }

        let report = self
            .allocator
            .preflight_resolved(&configuration, &template, &resolved.env)
            .await?;
        if !report.can_start {
            return Err(DeploymentError::PortConflict {
                configuration_id: id.clone(),
                report: Box::new(report),
            });
        }

        configuration.begin_deploy(self.store.clock())?;
        self.store.save(&permit, &configuration).await?;
        info!(
            configuration_id = %id,
            target = %configuration.target(),
            fingerprint = %fingerprint,
            "deploying"
        );

        let in_place = match configuration.record().cloned() {
            Some(record) if &record.target == configuration.target() => Some(record.refs),
            Some(record) => {
                info!(configuration_id = %id, from = %record.target, "target changed; tearing down");
                if let Err(error) = self.teardown_record(&record).await {
                    return Err(self.fail(&permit, configuration, error).await);
                }
                None
            }
            None => None,
        };

        let refs = match self
            .submit_with_retry(backend.as_ref(), &artifact, in_place.as_ref(), id)
            .await
        {
            Ok(refs) => refs,
            Err(error) => return Err(self.fail(&permit, configuration, error).await),
        };

        let mut record = DeploymentRecord {
            target: configuration.target().clone(),
            refs,
            fingerprint,
            bound_ports: artifact.bound_ports(),
            deployed_at: self.store.clock().utc(),
        };
        configuration.record_submission(record.clone(), self.store.clock());
        self.store.save(&permit, &configuration).await?;

        match self
            .await_ready(backend.as_ref(), &record.refs, artifact.kind())
            .await
        {
            Readiness::Ready => {
                record.deployed_at = self.store.clock().utc();
                let handles = record.refs.to_string();
                configuration.mark_running(record, self.store.clock())?;
                self.store.save(&permit, &configuration).await?;
                info!(configuration_id = %id, refs = %handles, "configuration running");
                Ok(configuration)
            }
            Readiness::TimedOut { last_condition } => {
                let failure = DeploymentError::BackendTimeout {
                    configuration_id: id.clone(),
                    last_condition,
                };
                Err(self
                    .record_failure(&permit, configuration, FailureKind::BackendTimeout, failure)
                    .await)
            }
            Readiness::Crashed(exit) => {
                let failure = DeploymentError::RuntimeCrash {
                    configuration_id: id.clone(),
                    exit,
                };
                Err(self
                    .record_failure(&permit, configuration, FailureKind::RuntimeCrash, failure)
                    .await)
            }
            Readiness::Failed(error) => Err(self.fail(&permit, configuration, error).await),
        }
    }

    /// Tears down a configuration and moves it to `stopped`.
    ///
    /// Waits for an in-flight deploy of the same configuration. Undeploying
    /// a pending or stopped configuration is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError::Conflict`] when another undeploy is
    /// pending, backend errors when teardown fails, or lookup errors.
    pub async fn undeploy(&self, id: &ConfigurationId) -> DeploymentResult<ServiceConfiguration> {
        let permit = self.store.guards().begin_undeploy(id).await?;
        let configuration = self.store.get(id).await?;
        self.stop(&permit, configuration).await
    }

    /// Observes a running configuration and records a crash.
    ///
    /// A workload that exited or vanished after reaching `running` moves
    /// the configuration to `error` with [`FailureKind::RuntimeCrash`]. It
    /// is never redeployed automatically.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError::Conflict`] while another operation is in
    /// flight, backend errors when the state cannot be observed, or lookup
    /// errors.
    pub async fn refresh_status(
        &self,
        id: &ConfigurationId,
    ) -> DeploymentResult<ServiceConfiguration> {
        let permit = self.store.guards().try_begin(id)?;
        let mut configuration = self.store.get(id).await?;
        let Some(record) = configuration
            .record()
            .filter(|_| configuration.status() == DeploymentStatus::Running)
            .cloned()
        else {
            return Ok(configuration);
        };

        let backend_error = |source| DeploymentError::Backend {
            configuration_id: id.clone(),
            source,
        };
        let backend = self
            .backends
            .backend_for(&record.target)
            .map_err(backend_error)?;
        let observed = self
            .call(backend.status(&record.refs))
            .await
            .map_err(backend_error)?;

        let exit = match observed {
            ObservedState::Rollout { .. } => return Ok(configuration),
            ObservedState::Exited(exit) => exit,
            ObservedState::Missing => ExitInfo::new(None, "workload disappeared"),
        };
        warn!(configuration_id = %id, exit = %exit, "runtime crash detected");
        configuration.mark_failed(FailureKind::RuntimeCrash, exit.to_string(), self.store.clock())?;
        self.store.save(&permit, &configuration).await?;
        Ok(configuration)
    }

    /// Refreshes every running configuration and returns those found
    /// crashed. Configurations busy with another operation are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first lookup or backend error.
    pub async fn refresh_all(&self) -> DeploymentResult<Vec<ConfigurationId>> {
        let mut crashed = Vec::new();
        for configuration in self.store.list().await? {
            if configuration.status() != DeploymentStatus::Running {
                continue;
            }
            match self.refresh_status(configuration.id()).await {
                Ok(refreshed) if refreshed.status() == DeploymentStatus::Error => {
                    crashed.push(refreshed.id().clone());
                }
                Ok(_) => {}
                Err(DeploymentError::Conflict(busy)) => {
                    debug!(configuration_id = %busy.0, "busy; refresh skipped");
                }
                Err(error) => return Err(error),
            }
        }
        Ok(crashed)
    }

    /// Undeploys if needed, deletes the configuration and clears provider
    /// selections that point at it. Returns the released capabilities.
    ///
    /// # Errors
    ///
    /// Returns teardown, lookup or selection errors.
    pub async fn remove(&self, id: &ConfigurationId) -> DeploymentResult<Vec<CapabilityName>> {
        let permit = self.store.guards().begin_undeploy(id).await?;
        let configuration = self.store.get(id).await?;
        self.stop(&permit, configuration).await?;
        self.store.delete_with(&permit).await?;
        Ok(self.resolver.release_provider(id).await?)
    }

    async fn stop(
        &self,
        permit: &OperationPermit,
        mut configuration: ServiceConfiguration,
    ) -> DeploymentResult<ServiceConfiguration> {
        let clock = self.store.clock();
        match configuration.status() {
            DeploymentStatus::Pending | DeploymentStatus::Stopped => {
                debug!(configuration_id = %permit.id(), "nothing deployed; undeploy skipped");
                return Ok(configuration);
            }
            DeploymentStatus::Deploying => {
                configuration.mark_failed(FailureKind::Backend, "deploy interrupted", clock)?;
            }
            DeploymentStatus::Running | DeploymentStatus::Error => {}
        }

        if let Some(record) = configuration.record() {
            self.teardown_record(record)
                .await
                .map_err(|source| DeploymentError::Backend {
                    configuration_id: permit.id().clone(),
                    source,
                })?;
        }
        configuration.mark_stopped(clock)?;
        self.store.save(permit, &configuration).await?;
        info!(configuration_id = %permit.id(), "configuration stopped");
        Ok(configuration)
    }

    async fn teardown_record(&self, record: &DeploymentRecord) -> BackendResult<()> {
        let backend = self.backends.backend_for(&record.target)?;
        self.call(backend.teardown(&record.refs)).await
    }

    async fn submit_with_retry(
        &self,
        backend: &dyn DeploymentBackend,
        artifact: &Artifact,
        previous: Option<&RuntimeRefs>,
        id: &ConfigurationId,
    ) -> BackendResult<RuntimeRefs> {
        let attempts = self.settings.submit_attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = match previous {
                Some(refs) => self.call(backend.update(refs, artifact)).await,
                None => self.call(backend.submit(artifact)).await,
            };
            match outcome {
                Err(error) if error.is_retryable() && attempt < attempts => {
                    let delay = self.settings.backoff(attempt);
                    warn!(
                        configuration_id = %id,
                        attempt,
                        delay = ?delay,
                        error = %error,
                        "transient backend error; retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn await_ready(
        &self,
        backend: &dyn DeploymentBackend,
        refs: &RuntimeRefs,
        kind: BackendKind,
    ) -> Readiness {
        let budget = match kind {
            BackendKind::Container => self.settings.container_start_timeout(),
            BackendKind::Cluster => self.settings.rollout_timeout(),
        };
        let deadline = Instant::now() + budget;
        let mut last_condition = "no status observed".to_owned();
        loop {
            match self.call(backend.status(refs)).await {
                Ok(state) if state.is_ready() => return Readiness::Ready,
                Ok(ObservedState::Exited(exit)) => return Readiness::Crashed(exit),
                Ok(state) => last_condition = state.to_string(),
                Err(error) if error.is_retryable() => last_condition = error.to_string(),
                Err(error) => return Readiness::Failed(error),
            }
            if Instant::now() >= deadline {
                return Readiness::TimedOut { last_condition };
            }
            sleep(self.settings.poll_interval()).await;
        }
    }

    async fn call<T>(
        &self,
        operation: impl Future<Output = BackendResult<T>> + Send,
    ) -> BackendResult<T> {
        timeout(self.settings.backend_call_timeout(), operation)
            .await
            .unwrap_or_else(|_| {
                Err(BackendError::CallTimeout {
                    after_ms: self.settings.backend_call_timeout_ms,
                })
            })
    }

    async fn fail(
        &self,
        permit: &OperationPermit,
        configuration: ServiceConfiguration,
        error: BackendError,
    ) -> DeploymentError {
        let (kind, failure) = backend_failure(permit.id(), error);
        self.record_failure(permit, configuration, kind, failure).await
    }

    async fn record_failure(
        &self,
        permit: &OperationPermit,
        mut configuration: ServiceConfiguration,
        kind: FailureKind,
        failure: DeploymentError,
    ) -> DeploymentError {
        warn!(
            configuration_id = %permit.id(),
            kind = kind.as_str(),
            error = %failure,
            "deploy failed"
        );
        let recorded = configuration
            .mark_failed(kind, failure.to_string(), self.store.clock())
            .map_err(ConfigurationStoreError::from);
        let saved = match recorded {
            Ok(()) => self.store.save(permit, &configuration).await,
            Err(error) => Err(error),
        };
        if let Err(error) = saved {
            warn!(configuration_id = %permit.id(), error = %error, "failure could not be recorded");
        }
        failure
    }
}
