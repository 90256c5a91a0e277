//! Docker Compose stacks.
//!
//! Multi-service topologies (primary plus replica, pooler in front of a
//! server) are described in a compose file and brought up under a project
//! name derived from the run identity.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;

use crate::docker::DockerCli;
use crate::error::{InfraError, InfraResult};
use crate::identity::RunIdentity;

/// Bound for `compose up`, which may pull images.
pub const COMPOSE_UP_TIMEOUT: Duration = Duration::from_secs(600);

/// A compose project owned by one run.
#[derive(Debug, Clone)]
pub struct ComposeStack {
    docker: DockerCli,
    project: String,
    file: PathBuf,
    // Keeps an inline compose file alive for the lifetime of the stack.
    _inline: Option<Arc<NamedTempFile>>,
}

impl ComposeStack {
    /// Uses a compose file on disk.
    pub fn from_file(docker: DockerCli, identity: &RunIdentity, file: impl Into<PathBuf>) -> Self {
        Self {
            docker,
            project: identity.resource_name("stack"),
            file: file.into(),
            _inline: None,
        }
    }

    /// Writes `yaml` to a temporary file and uses that.
    pub fn from_yaml_str(docker: DockerCli, identity: &RunIdentity, yaml: &str) -> InfraResult<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("pgh-compose-")
            .suffix(".yml")
            .tempfile()?;
        file.write_all(yaml.as_bytes())?;
        file.flush()?;
        Ok(Self {
            docker,
            project: identity.resource_name("stack"),
            file: file.path().to_path_buf(),
            _inline: Some(Arc::new(file)),
        })
    }

    /// Compose project name.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Compose file path.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Starts every service detached.
    pub fn up(&self) -> InfraResult<()> {
        tracing::info!(project = %self.project, file = %self.file.display(), "compose up");
        let spec = self
            .compose(["up", "-d"])
            .timeout(COMPOSE_UP_TIMEOUT);
        self.docker.checked(spec)?;
        Ok(())
    }

    /// Stops and removes every service, network, and volume of the project.
    pub fn down(&self) -> InfraResult<()> {
        tracing::info!(project = %self.project, "compose down");
        self.docker
            .checked(self.compose(["down", "-v", "--remove-orphans"]))?;
        Ok(())
    }

    /// Container id of `service`.
    pub fn container_id(&self, service: &str) -> InfraResult<String> {
        let output = self.docker.checked(self.compose(["ps", "-q", service]))?;
        output
            .stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(String::from)
            .ok_or_else(|| InfraError::NoSuchService {
                project: self.project.clone(),
                service: service.to_string(),
            })
    }

    fn compose<'a, I>(&self, args: I) -> crate::process::ProcessSpec
    where
        I: IntoIterator<Item = &'a str>,
    {
        let file = self.file.to_string_lossy().into_owned();
        let mut all = vec![
            "compose".to_string(),
            "-p".to_string(),
            self.project.clone(),
            "-f".to_string(),
            file,
        ];
        all.extend(args.into_iter().map(String::from));
        self.docker.command(all)
    }
}
