//! [`ContainerRuntime`] backed by the `docker` command-line client.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{InfraError, InfraResult};
use crate::identity::RUN_LABEL;
use crate::process::{CommandRunner, ProcessOutput, ProcessSpec};
use crate::runtime::{
    ContainerRuntime, ContainerSpec, ContainerState, ExecRequest, HealthStatus, RunResources,
    ServiceStatus,
};

/// Environment variable naming the docker binary.
pub const DOCKER_ENV: &str = "PGH_DOCKER";

/// Default bound for short docker commands (inspect, rm, network ...).
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Bound for `docker run`, which pulls the image when it is not cached.
pub const START_TIMEOUT: Duration = Duration::from_secs(600);

/// Finds the docker executable.
///
/// Checks an explicit path, then `PGH_DOCKER`, then `PATH`.
pub fn find_docker(explicit: Option<&Path>) -> InfraResult<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
    }

    if let Ok(path) = std::env::var(DOCKER_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        if let Ok(found) = which::which(&path) {
            return Ok(found);
        }
    }

    let names = if cfg!(windows) {
        vec!["docker.exe", "docker"]
    } else {
        vec!["docker"]
    };
    for name in names {
        if let Ok(path) = which::which(name) {
            return Ok(path);
        }
    }

    Err(InfraError::DockerNotFound)
}

/// Drives containers through the docker CLI.
#[derive(Clone)]
pub struct DockerCli {
    binary: PathBuf,
    runner: Arc<dyn CommandRunner>,
    command_timeout: Duration,
}

impl std::fmt::Debug for DockerCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerCli")
            .field("binary", &self.binary)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DockerState {
    #[serde(default)]
    status: String,
    #[serde(default)]
    exit_code: Option<i32>,
    #[serde(default)]
    health: Option<DockerHealth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DockerHealth {
    #[serde(default)]
    status: String,
}

impl DockerCli {
    /// Creates a client for `binary` that runs commands through `runner`.
    pub fn new(binary: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Locates docker and creates a client.
    pub fn locate(explicit: Option<&Path>, runner: Arc<dyn CommandRunner>) -> InfraResult<Self> {
        Ok(Self::new(find_docker(explicit)?, runner))
    }

    /// Sets the bound for short commands.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Path to the docker binary.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// The runner commands go through.
    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        Arc::clone(&self.runner)
    }

    /// Server version reported by the daemon.
    pub fn server_version(&self) -> InfraResult<String> {
        let output = self.checked(self.command(["version", "--format", "{{.Server.Version}}"]))?;
        Ok(output.stdout.trim().to_string())
    }

    /// Returns true if `docker compose` is available.
    pub fn has_compose(&self) -> bool {
        self.runner
            .run(&self.command(["compose", "version"]))
            .map(|o| o.success())
            .unwrap_or(false)
    }

    pub(crate) fn command<I, S>(&self, args: I) -> ProcessSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ProcessSpec::new(&self.binary)
            .args(args)
            .timeout(self.command_timeout)
    }

    pub(crate) fn checked(&self, spec: ProcessSpec) -> InfraResult<ProcessOutput> {
        let output = self.runner.run(&spec)?;
        if !output.success() {
            return Err(InfraError::command_failed(
                spec.display(),
                output.exit_code(),
                output.stderr,
            ));
        }
        Ok(output)
    }

    fn list_names(&self, args: &[&str]) -> InfraResult<Vec<String>> {
        let output = self.checked(self.command(args.iter().copied()))?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}

/// Builds the `docker run` argv for a spec.
pub fn run_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--detach".to_string(),
        "--name".to_string(),
        spec.name.clone(),
    ];
    for (key, value) in &spec.labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", key, value));
    }
    for (key, value) in &spec.env {
        args.push("--env".to_string());
        args.push(format!("{}={}", key, value));
    }
    for (source, target) in &spec.volumes {
        args.push("--volume".to_string());
        args.push(format!("{}:{}", source, target));
    }
    if let Some(ref network) = spec.network {
        args.push("--network".to_string());
        args.push(network.clone());
    }
    if let Some(ref memory) = spec.limits.memory {
        args.push("--memory".to_string());
        args.push(memory.clone());
    }
    if let Some(ref cpus) = spec.limits.cpus {
        args.push("--cpus".to_string());
        args.push(cpus.clone());
    }
    if let Some(ref shm) = spec.limits.shm_size {
        args.push("--shm-size".to_string());
        args.push(shm.clone());
    }
    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

/// Builds the `docker exec` argv for a request.
pub fn exec_args(request: &ExecRequest) -> Vec<String> {
    let mut args = vec!["exec".to_string()];
    if request.stdin.is_some() {
        args.push("--interactive".to_string());
    }
    if let Some(ref user) = request.user {
        args.push("--user".to_string());
        args.push(user.clone());
    }
    for (key, value) in &request.env {
        args.push("--env".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.push(request.container.clone());
    args.extend(request.argv.iter().cloned());
    args
}

/// Parses the output of `docker inspect --format '{{json .State}}'`.
pub fn parse_state(name: &str, json: &str) -> InfraResult<ServiceStatus> {
    let state: DockerState =
        serde_json::from_str(json.trim()).map_err(|source| InfraError::InspectParse {
            name: name.to_string(),
            source,
        })?;
    let container_state = ContainerState::from_docker(&state.status);
    let health = match state.health {
        Some(h) => HealthStatus::from_docker(&h.status),
        None => HealthStatus::None,
    };
    Ok(ServiceStatus {
        health,
        state: container_state,
        exit_code: if container_state.is_terminal() {
            state.exit_code
        } else {
            None
        },
    })
}

fn label_args(labels: &[(String, String)]) -> Vec<String> {
    labels
        .iter()
        .flat_map(|(k, v)| ["--label".to_string(), format!("{}={}", k, v)])
        .collect()
}

impl ContainerRuntime for DockerCli {
    fn start(&self, spec: &ContainerSpec) -> InfraResult<String> {
        tracing::info!(container = %spec.name, image = %spec.image, "starting container");
        let command = self
            .command(run_args(spec))
            .timeout(START_TIMEOUT.max(self.command_timeout));
        let output = self.checked(command)?;
        Ok(output.stdout.trim().to_string())
    }

    fn inspect(&self, name: &str) -> InfraResult<ServiceStatus> {
        let output = self.checked(self.command(["inspect", "--format", "{{json .State}}", name]))?;
        parse_state(name, &output.stdout)
    }

    fn exec(&self, request: &ExecRequest) -> InfraResult<ProcessOutput> {
        let mut spec = ProcessSpec::new(&self.binary).args(exec_args(request));
        if let Some(ref input) = request.stdin {
            spec = spec.stdin(input.clone());
        }
        if let Some(timeout) = request.timeout {
            spec = spec.timeout(timeout);
        }
        Ok(self.runner.run(&spec)?)
    }

    fn logs(&self, name: &str, tail: usize) -> InfraResult<String> {
        let tail = tail.to_string();
        let output = self.checked(self.command(["logs", "--tail", tail.as_str(), name]))?;
        // The server logs to stderr; docker replays it on stderr.
        let mut text = output.stdout;
        text.push_str(&output.stderr);
        Ok(text)
    }

    fn stop(&self, name: &str, grace: Duration) -> InfraResult<()> {
        tracing::info!(container = %name, "stopping container");
        let secs = grace.as_secs().to_string();
        self.checked(self.command(["stop", "--time", secs.as_str(), name]))?;
        Ok(())
    }

    fn remove(&self, name: &str) -> InfraResult<()> {
        self.checked(self.command(["rm", "--force", "--volumes", name]))?;
        Ok(())
    }

    fn create_network(&self, name: &str, labels: &[(String, String)]) -> InfraResult<()> {
        let mut args = vec!["network".to_string(), "create".to_string()];
        args.extend(label_args(labels));
        args.push(name.to_string());
        self.checked(self.command(args))?;
        Ok(())
    }

    fn remove_network(&self, name: &str) -> InfraResult<()> {
        self.checked(self.command(["network", "rm", name]))?;
        Ok(())
    }

    fn create_volume(&self, name: &str, labels: &[(String, String)]) -> InfraResult<()> {
        let mut args = vec!["volume".to_string(), "create".to_string()];
        args.extend(label_args(labels));
        args.push(name.to_string());
        self.checked(self.command(args))?;
        Ok(())
    }

    fn remove_volume(&self, name: &str) -> InfraResult<()> {
        self.checked(self.command(["volume", "rm", name]))?;
        Ok(())
    }

    fn list_by_run(&self, run_id: &str) -> InfraResult<RunResources> {
        let filter = format!("label={}={}", RUN_LABEL, run_id);
        Ok(RunResources {
            containers: self.list_names(&[
                "ps",
                "--all",
                "--filter",
                filter.as_str(),
                "--format",
                "{{.Names}}",
            ])?,
            networks: self.list_names(&[
                "network",
                "ls",
                "--filter",
                filter.as_str(),
                "--format",
                "{{.Name}}",
            ])?,
            volumes: self.list_names(&[
                "volume",
                "ls",
                "--filter",
                filter.as_str(),
                "--format",
                "{{.Name}}",
            ])?,
        })
    }
}
