//! Container runtime abstraction.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::InfraResult;
use crate::identity::{RunIdentity, RUN_LABEL};
use crate::process::ProcessOutput;

/// Container health as reported by the image's health check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Health check has not passed yet.
    Starting,
    /// Health check passes.
    Healthy,
    /// Health check fails.
    Unhealthy,
    /// The image defines no health check.
    None,
    /// Health could not be determined.
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Maps Docker's `.State.Health.Status` string.
    pub fn from_docker(status: &str) -> Self {
        match status {
            "starting" => HealthStatus::Starting,
            "healthy" => HealthStatus::Healthy,
            "unhealthy" => HealthStatus::Unhealthy,
            "" | "none" => HealthStatus::None,
            _ => HealthStatus::Unknown,
        }
    }

    /// Returns the string identifier for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Starting => "starting",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::None => "none",
            HealthStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container process state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Restarting,
    Paused,
    Exited,
    Stopped,
    Dead,
    #[default]
    Unknown,
}

impl ContainerState {
    /// Maps Docker's `.State.Status` string.
    pub fn from_docker(status: &str) -> Self {
        match status {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "restarting" => ContainerState::Restarting,
            "paused" => ContainerState::Paused,
            "exited" => ContainerState::Exited,
            "removing" | "stopped" => ContainerState::Stopped,
            "dead" => ContainerState::Dead,
            _ => ContainerState::Unknown,
        }
    }

    /// Returns the string identifier for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Restarting => "restarting",
            ContainerState::Paused => "paused",
            ContainerState::Exited => "exited",
            ContainerState::Stopped => "stopped",
            ContainerState::Dead => "dead",
            ContainerState::Unknown => "unknown",
        }
    }

    /// A container in this state will not become ready without a restart.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContainerState::Exited | ContainerState::Dead)
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of a container. Never cached; fetched on every poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub health: HealthStatus,
    pub state: ContainerState,
    /// Exit code when the container has exited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl ServiceStatus {
    /// Creates a status with no exit code.
    pub fn new(health: HealthStatus, state: ContainerState) -> Self {
        Self {
            health,
            state,
            exit_code: None,
        }
    }

    /// Running with a passing health check.
    pub fn healthy() -> Self {
        Self::new(HealthStatus::Healthy, ContainerState::Running)
    }

    /// Running with a pending health check.
    pub fn starting() -> Self {
        Self::new(HealthStatus::Starting, ContainerState::Running)
    }

    /// Exited with the given code.
    pub fn exited(code: i32) -> Self {
        Self {
            health: HealthStatus::Unknown,
            state: ContainerState::Exited,
            exit_code: Some(code),
        }
    }
}

/// Memory, CPU and shared-memory limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceLimits {
    /// Docker memory limit (e.g. "2g").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    /// CPU quota (e.g. "2").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpus: Option<String>,
    /// `/dev/shm` size (e.g. "256m").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shm_size: Option<String>,
}

/// Credentials used for administrative SQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PgCredentials {
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for PgCredentials {
    fn default() -> Self {
        Self {
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "postgres".to_string(),
        }
    }
}

/// Everything needed to start one container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Environment variables.
    pub env: Vec<(String, String)>,
    /// Volume mounts as `(source, target)`.
    pub volumes: Vec<(String, String)>,
    /// Network to attach to.
    pub network: Option<String>,
    /// Resource limits.
    pub limits: ResourceLimits,
    /// Labels.
    pub labels: Vec<(String, String)>,
    /// Command override (arguments after the image).
    pub command: Vec<String>,
}

impl ContainerSpec {
    /// Creates a spec for `image` named by the run identity for `role`.
    ///
    /// The container is labeled with the run id so stray resources can be
    /// found after a crash.
    pub fn new(identity: &RunIdentity, role: &str, image: impl Into<String>) -> Self {
        Self {
            name: identity.resource_name(role),
            image: image.into(),
            labels: vec![(RUN_LABEL.to_string(), identity.run_id().to_string())],
            ..Default::default()
        }
    }

    /// Creates a PostgreSQL server spec.
    ///
    /// Sets the `POSTGRES_*` environment and, when `preload` is non-empty,
    /// passes it as a `-c shared_preload_libraries=` server argument.
    pub fn postgres(
        identity: &RunIdentity,
        role: &str,
        image: impl Into<String>,
        credentials: &PgCredentials,
        preload: &str,
    ) -> Self {
        let mut spec = Self::new(identity, role, image)
            .env("POSTGRES_USER", &credentials.user)
            .env("POSTGRES_PASSWORD", &credentials.password)
            .env("POSTGRES_DB", &credentials.database);
        if !preload.is_empty() {
            spec.command = vec![
                "postgres".to_string(),
                "-c".to_string(),
                format!("shared_preload_libraries={}", preload),
            ];
        }
        spec
    }

    /// Adds an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Adds a volume mount.
    pub fn volume(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.volumes.push((source.into(), target.into()));
        self
    }

    /// Attaches the container to a network.
    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Sets resource limits.
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Adds a server argument (`-c key=value`), starting the command with
    /// `postgres` if it is empty.
    pub fn server_setting(mut self, key: &str, value: &str) -> Self {
        if self.command.is_empty() {
            self.command.push("postgres".to_string());
        }
        self.command.push("-c".to_string());
        self.command.push(format!("{}={}", key, value));
        self
    }
}

/// A command to execute inside a running container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecRequest {
    /// Container name.
    pub container: String,
    /// Command argv.
    pub argv: Vec<String>,
    /// Environment variables set for the command.
    pub env: Vec<(String, String)>,
    /// Bytes fed to the command's stdin.
    pub stdin: Option<Vec<u8>>,
    /// User to run as.
    pub user: Option<String>,
    /// Time bound for the command.
    pub timeout: Option<Duration>,
}

impl ExecRequest {
    /// Creates a request to run `argv` in `container`.
    pub fn new<I, S>(container: impl Into<String>, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            container: container.into(),
            argv: argv.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Sets an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Feeds `input` to stdin.
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Bounds the command's run time.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Resources carrying a run label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResources {
    pub containers: Vec<String>,
    pub networks: Vec<String>,
    pub volumes: Vec<String>,
}

impl RunResources {
    /// Returns true if nothing was found.
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.networks.is_empty() && self.volumes.is_empty()
    }
}

/// Operations the harness needs from a container engine.
pub trait ContainerRuntime: Send + Sync {
    /// Starts a detached container and returns its id.
    fn start(&self, spec: &ContainerSpec) -> InfraResult<String>;

    /// Observes a container's current health and state.
    fn inspect(&self, name: &str) -> InfraResult<ServiceStatus>;

    /// Runs a command inside a container.
    ///
    /// A non-zero exit is returned as output, not as an error.
    fn exec(&self, request: &ExecRequest) -> InfraResult<ProcessOutput>;

    /// Returns the last `tail` lines of a container's log.
    fn logs(&self, name: &str, tail: usize) -> InfraResult<String>;

    /// Stops a container.
    fn stop(&self, name: &str, grace: Duration) -> InfraResult<()>;

    /// Removes a container and its anonymous volumes.
    fn remove(&self, name: &str) -> InfraResult<()>;

    /// Creates a labeled network.
    fn create_network(&self, name: &str, labels: &[(String, String)]) -> InfraResult<()>;

    /// Removes a network.
    fn remove_network(&self, name: &str) -> InfraResult<()>;

    /// Creates a labeled volume.
    fn create_volume(&self, name: &str, labels: &[(String, String)]) -> InfraResult<()>;

    /// Removes a volume.
    fn remove_volume(&self, name: &str) -> InfraResult<()>;

    /// Lists resources labeled with `run_id`.
    fn list_by_run(&self, run_id: &str) -> InfraResult<RunResources>;
}
