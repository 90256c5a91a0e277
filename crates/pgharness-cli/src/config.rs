//! Harness configuration.
//!
//! Settings come from three layers, later ones winning: the JSON file given
//! with `--config`, `PGH_*` environment variables, then command-line flags.
//! Every field has a default, so an empty object is a valid config file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use pgharness_docker::lifecycle::DEFAULT_LOG_TAIL_LINES;
use pgharness_docker::{PgCredentials, PollPolicy, ResourceLimits, DOCKER_ENV};
use pgharness_model::{TestMode, TEST_MODE_ENV};
use pgharness_regress::{CompareOptions, SessionConfig, DEFAULT_CONTEXT_LINES};

/// Environment variable overriding the image.
pub const IMAGE_ENV: &str = "PGH_IMAGE";

/// Image used when nothing else is configured.
pub const DEFAULT_IMAGE: &str = "postgres:17";

/// Harness settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct HarnessConfig {
    /// Image reference for the database container.
    pub image: String,
    /// Docker binary; `PATH` lookup when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker: Option<PathBuf>,
    /// Superuser credentials passed to the container.
    pub postgres: PgCredentials,
    /// Readiness deadline for a fresh container.
    pub startup_timeout_secs: u64,
    /// Sleep between readiness probes.
    pub poll_interval_ms: u64,
    /// Probes that must pass in a row.
    pub consecutive_successes: u32,
    /// Bound for each psql invocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement_timeout_secs: Option<u64>,
    /// Container log lines attached to infrastructure errors.
    pub log_tail_lines: usize,
    pub limits: ResourceLimits,
    /// Context lines in regression diffs.
    pub diff_context: usize,
    /// Where actual output of failing tests is kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_dir: Option<PathBuf>,
    /// Test mode when neither `--mode` nor `PGH_TEST_MODE` is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<TestMode>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let readiness = PollPolicy::first_boot();
        Self {
            image: DEFAULT_IMAGE.to_string(),
            docker: None,
            postgres: PgCredentials::default(),
            startup_timeout_secs: readiness.timeout.as_secs(),
            poll_interval_ms: readiness.interval.as_millis() as u64,
            consecutive_successes: readiness.consecutive_successes,
            statement_timeout_secs: None,
            log_tail_lines: DEFAULT_LOG_TAIL_LINES,
            limits: ResourceLimits::default(),
            diff_context: DEFAULT_CONTEXT_LINES,
            results_dir: None,
            mode: None,
        }
    }
}

impl HarnessConfig {
    /// Reads a config file, or returns defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    /// Applies `PGH_IMAGE`, `PGH_DOCKER`, and `PGH_TEST_MODE`.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(image) = get(IMAGE_ENV) {
            self.image = image;
        }
        if let Some(docker) = get(DOCKER_ENV) {
            self.docker = Some(PathBuf::from(docker));
        }
        if let Some(mode) = get(TEST_MODE_ENV) {
            let mode = mode
                .parse::<TestMode>()
                .with_context(|| format!("invalid {}", TEST_MODE_ENV))?;
            self.mode = Some(mode);
        }
        Ok(())
    }

    /// Readiness polling for a fresh container.
    pub fn readiness_policy(&self) -> PollPolicy {
        PollPolicy::first_boot()
            .interval(Duration::from_millis(self.poll_interval_ms))
            .timeout(Duration::from_secs(self.startup_timeout_secs))
            .consecutive_successes(self.consecutive_successes)
    }

    /// Container session settings for a run with `preload`.
    pub fn session_config(&self, preload: impl Into<String>) -> SessionConfig {
        SessionConfig {
            credentials: self.postgres.clone(),
            readiness: self.readiness_policy(),
            limits: self.limits.clone(),
            log_tail_lines: self.log_tail_lines,
            statement_timeout: self.statement_timeout_secs.map(Duration::from_secs),
            ..SessionConfig::new(self.image.clone(), preload)
        }
    }

    /// Diff and results-directory options.
    pub fn compare_options(&self) -> CompareOptions {
        let options = CompareOptions::default().context_lines(self.diff_context);
        match &self.results_dir {
            Some(dir) => options.results_dir(dir),
            None => options,
        }
    }
}
