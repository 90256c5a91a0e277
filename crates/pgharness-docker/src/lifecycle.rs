//! Container lifecycle: start, readiness, promotion, teardown.
//!
//! Each container moves through `Starting -> Polling -> Healthy | Failed`,
//! and to `Stopped` on explicit teardown. SQL access is only handed out in
//! the `Healthy` state.

use std::time::Duration;

use crate::cancel::CancellationToken;
use crate::cleanup::ResourceLedger;
use crate::error::{InfraError, InfraResult};
use crate::policy::{PollError, PollPolicy, PollStep};
use crate::runtime::{
    ContainerRuntime, ContainerSpec, ContainerState, ExecRequest, HealthStatus, PgCredentials,
    ServiceStatus,
};
use crate::sql::{SqlRunner, SqlTarget};

/// Default number of log lines attached to readiness failures.
pub const DEFAULT_LOG_TAIL_LINES: usize = 50;

/// Grace period given to `docker stop`.
pub const STOP_GRACE: Duration = Duration::from_secs(10);

/// Per-container lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Polling,
    Healthy,
    Failed,
    Stopped,
}

impl LifecycleState {
    /// Returns the string identifier for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Polling => "polling",
            LifecycleState::Healthy => "healthy",
            LifecycleState::Failed => "failed",
            LifecycleState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A container this run started (or adopted from a compose stack).
#[derive(Debug, Clone)]
pub struct ManagedContainer {
    name: String,
    id: String,
    state: LifecycleState,
    credentials: PgCredentials,
    last_status: ServiceStatus,
}

impl ManagedContainer {
    /// Adopts a container started elsewhere (e.g. by compose).
    pub fn adopt(name: impl Into<String>, id: impl Into<String>, credentials: PgCredentials) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            state: LifecycleState::Starting,
            credentials,
            last_status: ServiceStatus::default(),
        }
    }

    /// Container name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Container id as reported by the runtime.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Status seen on the most recent poll.
    pub fn last_status(&self) -> ServiceStatus {
        self.last_status
    }

    /// SQL access, available only once the container is healthy.
    pub fn sql_target(&self) -> InfraResult<SqlTarget> {
        if self.state != LifecycleState::Healthy {
            return Err(InfraError::NotReady {
                name: self.name.clone(),
                state: self.state.to_string(),
            });
        }
        Ok(SqlTarget::new(
            &self.name,
            &self.credentials.user,
            &self.credentials.password,
            &self.credentials.database,
        ))
    }
}

/// Drives containers through their lifecycle.
pub struct ContainerController<'a> {
    runtime: &'a dyn ContainerRuntime,
    cancel: CancellationToken,
    log_tail_lines: usize,
}

impl<'a> ContainerController<'a> {
    /// Creates a controller over `runtime`.
    pub fn new(runtime: &'a dyn ContainerRuntime, cancel: CancellationToken) -> Self {
        Self {
            runtime,
            cancel,
            log_tail_lines: DEFAULT_LOG_TAIL_LINES,
        }
    }

    /// Sets how many log lines are captured on failure.
    pub fn log_tail_lines(mut self, lines: usize) -> Self {
        self.log_tail_lines = lines;
        self
    }

    /// The runtime this controller drives.
    pub fn runtime(&self) -> &'a dyn ContainerRuntime {
        self.runtime
    }

    /// Starts a container.
    ///
    /// The name is recorded in `ledger` before the start call so a partially
    /// started container is still torn down. A failed start is not retried.
    pub fn start(
        &self,
        spec: &ContainerSpec,
        credentials: PgCredentials,
        ledger: &mut ResourceLedger,
    ) -> InfraResult<ManagedContainer> {
        if self.cancel.is_cancelled() {
            return Err(InfraError::Cancelled);
        }
        ledger.record_container(&spec.name)?;
        let id = self.runtime.start(spec)?;
        tracing::info!(container = %spec.name, id = %short_id(&id), "container started");
        Ok(ManagedContainer::adopt(&spec.name, id, credentials))
    }

    /// Polls until the container is ready.
    ///
    /// Ready means the image's health check reports `healthy`. When the image
    /// has no health check, `pg_isready` followed by `SELECT 1` must succeed
    /// on `policy.consecutive_successes` consecutive polls. A container seen
    /// in a terminal state fails at once; running out of time fails with the
    /// last observed health and state plus the log tail.
    pub fn wait_until_ready(
        &self,
        container: &mut ManagedContainer,
        policy: &PollPolicy,
    ) -> InfraResult<()> {
        container.state = LifecycleState::Polling;
        let required = policy.consecutive_successes.max(1);
        let mut streak = 0u32;
        let mut last = container.last_status;
        let name = container.name.clone();
        let credentials = container.credentials.clone();

        let outcome = policy.poll_until(&self.cancel, |attempt| {
            let status = match self.runtime.inspect(&name) {
                Ok(status) => status,
                Err(e) => {
                    tracing::debug!(container = %name, attempt, "inspect failed: {}", e);
                    return PollStep::Pending;
                }
            };
            last = status;

            if status.state.is_terminal() {
                return PollStep::Abort(status);
            }

            match status.health {
                HealthStatus::Healthy => PollStep::Done(()),
                HealthStatus::None if status.state == ContainerState::Running => {
                    if self.admin_probe(&name, &credentials) {
                        streak += 1;
                    } else {
                        streak = 0;
                    }
                    tracing::debug!(container = %name, attempt, streak, required, "probe");
                    if streak >= required {
                        PollStep::Done(())
                    } else {
                        PollStep::Pending
                    }
                }
                _ => {
                    streak = 0;
                    tracing::debug!(
                        container = %name,
                        attempt,
                        health = %status.health,
                        state = %status.state,
                        "not ready"
                    );
                    PollStep::Pending
                }
            }
        });
        container.last_status = last;

        match outcome {
            Ok(()) => {
                container.state = LifecycleState::Healthy;
                tracing::info!(container = %name, "container healthy");
                Ok(())
            }
            Err(PollError::Cancelled) => {
                container.state = LifecycleState::Failed;
                Err(InfraError::Cancelled)
            }
            Err(PollError::Aborted(status)) => {
                container.state = LifecycleState::Failed;
                Err(InfraError::ContainerExited {
                    name: name.clone(),
                    state: status.state,
                    exit_code: status.exit_code,
                    log_tail: self.log_tail(&name),
                })
            }
            Err(PollError::TimedOut { attempts, .. }) => {
                container.state = LifecycleState::Failed;
                tracing::debug!(container = %name, attempts, "readiness timed out");
                Err(InfraError::ReadinessTimeout {
                    name: name.clone(),
                    timeout_secs: policy.timeout.as_secs(),
                    health: last.health,
                    state: last.state,
                    log_tail: self.log_tail(&name),
                })
            }
        }
    }

    /// Promotes a standby and waits until it leaves recovery.
    pub fn promote(&self, container: &ManagedContainer, policy: &PollPolicy) -> InfraResult<()> {
        let target = container.sql_target()?;
        let sql = SqlRunner::new(self.runtime);

        tracing::info!(container = %container.name, "promoting standby");
        let output = sql.run("SELECT pg_promote()", &target);
        if !output.success {
            return Err(InfraError::command_failed(
                "SELECT pg_promote()",
                output.exit_code,
                output.stderr,
            ));
        }

        let outcome: Result<(), PollError<()>> = policy.poll_until(&self.cancel, |attempt| {
            match sql.query_scalar("SELECT pg_is_in_recovery()", &target) {
                Some(value) if value == "f" => PollStep::Done(()),
                other => {
                    tracing::debug!(container = %container.name, attempt, value = ?other, "still in recovery");
                    PollStep::Pending
                }
            }
        });

        match outcome {
            Ok(()) => {
                tracing::info!(container = %container.name, "promotion complete");
                Ok(())
            }
            Err(PollError::Cancelled) => Err(InfraError::Cancelled),
            Err(_) => Err(InfraError::PromotionTimeout {
                name: container.name.clone(),
                timeout_secs: policy.timeout.as_secs(),
            }),
        }
    }

    /// Stops and removes a container.
    pub fn stop(&self, container: &mut ManagedContainer) -> InfraResult<()> {
        self.runtime.stop(&container.name, STOP_GRACE)?;
        self.runtime.remove(&container.name)?;
        container.state = LifecycleState::Stopped;
        Ok(())
    }

    /// The last lines of a container's log, or a note that they are unavailable.
    pub fn log_tail(&self, name: &str) -> String {
        match self.runtime.logs(name, self.log_tail_lines) {
            Ok(text) => text,
            Err(e) => format!("<logs unavailable: {}>", e),
        }
    }

    fn admin_probe(&self, name: &str, credentials: &PgCredentials) -> bool {
        let isready = ExecRequest::new(
            name,
            [
                "pg_isready",
                "-U",
                credentials.user.as_str(),
                "-d",
                credentials.database.as_str(),
            ],
        );
        let ready = matches!(self.runtime.exec(&isready), Ok(o) if o.success());
        if !ready {
            return false;
        }

        let select = ExecRequest::new(
            name,
            [
                "psql",
                "-X",
                "-q",
                "-U",
                credentials.user.as_str(),
                "-d",
                credentials.database.as_str(),
                "-c",
                "SELECT 1",
            ],
        )
        .env("PGPASSWORD", &credentials.password);
        matches!(self.runtime.exec(&select), Ok(o) if o.success())
    }
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
