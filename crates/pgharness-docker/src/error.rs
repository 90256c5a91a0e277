//! Error types for container infrastructure.

use pgharness_model::HarnessError;
use thiserror::Error;

use crate::process::ProcessError;
use crate::runtime::{ContainerState, HealthStatus};

/// Result type for infrastructure operations.
pub type InfraResult<T> = Result<T, InfraError>;

/// Errors that make a run unable to continue.
#[derive(Debug, Error)]
pub enum InfraError {
    /// The docker binary could not be located.
    #[error("docker executable not found. Install Docker and ensure it is in PATH, or set PGH_DOCKER")]
    DockerNotFound,

    /// The process layer failed.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// A runtime command exited with a non-zero status.
    #[error("command '{command}' exited with status {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// The container never became ready.
    #[error("container '{name}' not ready: timeout after {timeout_secs}s (last health: {health}, state: {state})\n--- last log lines ---\n{log_tail}")]
    ReadinessTimeout {
        name: String,
        timeout_secs: u64,
        health: HealthStatus,
        state: ContainerState,
        log_tail: String,
    },

    /// The container stopped while the harness waited for it.
    #[error("container '{name}' entered state {state} (exit code {}) before becoming ready\n--- last log lines ---\n{log_tail}", display_code(.exit_code))]
    ContainerExited {
        name: String,
        state: ContainerState,
        exit_code: Option<i32>,
        log_tail: String,
    },

    /// A standby did not leave recovery in time.
    #[error("container '{name}' still in recovery {timeout_secs}s after pg_promote(): promotion timeout")]
    PromotionTimeout { name: String, timeout_secs: u64 },

    /// SQL was requested on a container that has not been confirmed ready.
    #[error("container '{name}' is not ready (lifecycle state: {state})")]
    NotReady { name: String, state: String },

    /// A resource name not created by this run was handed to cleanup.
    #[error("refusing to manage '{name}': not owned by run {run_id}")]
    NotOwned { name: String, run_id: String },

    /// `docker inspect` output could not be parsed.
    #[error("failed to parse inspect output for '{name}': {source}")]
    InspectParse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// A compose service has no container.
    #[error("compose project '{project}' has no container for service '{service}'")]
    NoSuchService { project: String, service: String },

    /// The run was cancelled.
    #[error("run cancelled")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl InfraError {
    /// Creates a command failure from a command line and its output.
    pub fn command_failed(
        command: impl Into<String>,
        exit_code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            stderr: stderr.into().trim().to_string(),
        }
    }

    /// Returns true if the error came from cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            InfraError::Cancelled | InfraError::Process(ProcessError::Cancelled { .. })
        )
    }
}

impl HarnessError for InfraError {
    fn code(&self) -> &'static str {
        match self {
            InfraError::DockerNotFound => "INFRA_001",
            InfraError::Process(_) => "INFRA_002",
            InfraError::CommandFailed { .. } => "INFRA_003",
            InfraError::ReadinessTimeout { .. } => "INFRA_004",
            InfraError::ContainerExited { .. } => "INFRA_005",
            InfraError::PromotionTimeout { .. } => "INFRA_006",
            InfraError::NotReady { .. } => "INFRA_007",
            InfraError::NotOwned { .. } => "INFRA_008",
            InfraError::InspectParse { .. } => "INFRA_009",
            InfraError::NoSuchService { .. } => "INFRA_010",
            InfraError::Cancelled => "INFRA_011",
            InfraError::Io(_) => "INFRA_012",
        }
    }

    fn category(&self) -> &'static str {
        "infrastructure"
    }
}
