//! Test harness utilities for running CLI commands.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::OnceLock;
use tempfile::TempDir;

/// Environment variable that enables tests needing a docker daemon.
pub const DOCKER_TESTS_ENV: &str = "PGH_RUN_DOCKER_TESTS";

/// Variables the CLI reads, removed from every CLI invocation.
pub const CLEARED_ENV: &[&str] = &[
    pgharness_model::TEST_MODE_ENV,
    pgharness_cli::config::IMAGE_ENV,
    pgharness_docker::DOCKER_ENV,
    pgharness_cli::logging::LOG_ENV,
];

/// Result of running the pgharness CLI.
#[derive(Debug)]
pub struct CliResult {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CliResult {
    /// Create a CliResult from a Command Output.
    pub fn from_output(output: Output) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }

    /// Assert that the command succeeded.
    pub fn assert_success(&self) {
        assert!(
            self.success,
            "Command failed with exit code {}.\nstdout: {}\nstderr: {}",
            self.exit_code, self.stdout, self.stderr
        );
    }

    /// Assert a specific exit code.
    pub fn assert_exit_code(&self, expected: i32) {
        assert_eq!(
            self.exit_code, expected,
            "unexpected exit code.\nstdout: {}\nstderr: {}",
            self.stdout, self.stderr
        );
    }
}

/// A test harness for running pgharness CLI commands.
pub struct TestHarness {
    /// Working directory for test inputs and outputs.
    pub work_dir: TempDir,
}

impl TestHarness {
    /// Create a new test harness.
    pub fn new() -> Self {
        Self {
            work_dir: TempDir::new().expect("Failed to create work dir"),
        }
    }

    /// Get the working directory path.
    pub fn path(&self) -> &Path {
        self.work_dir.path()
    }

    /// Writes `content` to `name` under the working directory.
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Run the pgharness CLI with the given arguments.
    ///
    /// The variables in [`CLEARED_ENV`] are removed so the host environment
    /// cannot change the outcome.
    pub fn run_cli(&self, args: &[&str]) -> CliResult {
        let manifest_path = workspace_manifest_path();

        let mut command = Command::new("cargo");
        command
            .args(["run", "--quiet", "--manifest-path"])
            .arg(&manifest_path)
            .args(["-p", "pgharness-cli", "--"])
            .args(args)
            .env("NO_COLOR", "1")
            .current_dir(self.path());
        for key in CLEARED_ENV {
            command.env_remove(key);
        }
        let output = command.output();

        match output {
            Ok(out) => CliResult::from_output(out),
            Err(e) => CliResult {
                success: false,
                exit_code: -1,
                stdout: String::new(),
                stderr: format!("Failed to run CLI: {}", e),
            },
        }
    }

    /// Validate a manifest using the CLI.
    pub fn validate_manifest(&self, manifest: &Path) -> CliResult {
        self.run_cli(&["validate", "--manifest", path_str(manifest)])
    }

    /// Print the activation order of a manifest using the CLI.
    pub fn order(&self, manifest: &Path) -> CliResult {
        self.run_cli(&["order", "--manifest", path_str(manifest)])
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("test paths are UTF-8")
}

fn workspace_manifest_path() -> PathBuf {
    static PATH: OnceLock<PathBuf> = OnceLock::new();
    PATH.get_or_init(|| {
        let manifest_path = workspace_root().join("Cargo.toml");
        manifest_path.canonicalize().unwrap_or(manifest_path)
    })
    .clone()
}

/// Root of the workspace.
pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// Check if docker-backed tests should run based on environment variable.
pub fn should_run_docker_tests() -> bool {
    std::env::var(DOCKER_TESTS_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
