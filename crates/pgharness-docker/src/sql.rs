//! Administrative SQL through `docker exec ... psql`.
//!
//! [`SqlRunner`] never fails: anything that goes wrong below it becomes an
//! unsuccessful [`SqlOutput`] so callers can treat SQL results as data.

use std::path::Path;
use std::time::Duration;

use crate::runtime::{ContainerRuntime, ExecRequest};

/// A container confirmed ready for SQL.
///
/// Only obtainable from a healthy [`ManagedContainer`](crate::ManagedContainer),
/// so no statement is ever sent to a server that has not passed readiness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTarget {
    container: String,
    user: String,
    password: String,
    database: String,
}

impl SqlTarget {
    pub(crate) fn new(
        container: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            container: container.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
        }
    }

    /// Container name.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Database user.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Same server, different database.
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..self.clone()
        }
    }
}

/// Output of one psql invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlOutput {
    pub stdout: String,
    pub stderr: String,
    /// psql exit code, or -1 when psql never ran to completion.
    pub exit_code: i32,
    pub success: bool,
}

impl SqlOutput {
    /// An output describing a failure that happened before or around psql.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: message.into(),
            exit_code: -1,
            success: false,
        }
    }
}

/// Runs SQL against a [`SqlTarget`].
pub struct SqlRunner<'a> {
    runtime: &'a dyn ContainerRuntime,
    timeout: Option<Duration>,
}

impl<'a> SqlRunner<'a> {
    /// Creates a runner over `runtime`.
    pub fn new(runtime: &'a dyn ContainerRuntime) -> Self {
        Self {
            runtime,
            timeout: None,
        }
    }

    /// Bounds every psql invocation.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Runs a single statement with `psql -c`.
    pub fn run(&self, sql: &str, target: &SqlTarget) -> SqlOutput {
        let mut argv = base_psql(target);
        argv.extend(["-v", "ON_ERROR_STOP=1", "-c", sql].map(String::from));
        self.exec(target, argv, None)
    }

    /// Runs a multi-statement script piped on stdin (`psql -f -`).
    pub fn run_script(&self, script: &str, target: &SqlTarget) -> SqlOutput {
        let mut argv = base_psql(target);
        argv.extend(["-v", "ON_ERROR_STOP=1", "-f", "-"].map(String::from));
        self.exec(target, argv, Some(script))
    }

    /// Reads a script from disk and runs it like [`SqlRunner::run_script`].
    pub fn run_file(&self, path: &Path, target: &SqlTarget) -> SqlOutput {
        match std::fs::read_to_string(path) {
            Ok(script) => self.run_script(&script, target),
            Err(e) => SqlOutput::error(format!("failed to read {}: {}", path.display(), e)),
        }
    }

    /// Runs a regression script in echo mode, like `pg_regress`.
    ///
    /// Statements are echoed (`-a`) and execution continues past errors. The
    /// server's error messages are merged into stdout in the order psql emits
    /// them so the result can be compared with an expected `.out` file.
    pub fn run_regression(&self, script: &str, target: &SqlTarget) -> SqlOutput {
        // The shell string is fixed; connection values travel as environment.
        let argv = vec![
            "sh".to_string(),
            "-c".to_string(),
            "exec psql -X -a -q -U \"$PGUSER\" -d \"$PGDATABASE\" -f - 2>&1".to_string(),
        ];
        self.exec(target, argv, Some(script))
    }

    /// Runs a tuples-only query and returns its trimmed single value.
    ///
    /// Returns `None` if the query fails.
    pub fn query_scalar(&self, sql: &str, target: &SqlTarget) -> Option<String> {
        let mut argv = base_psql(target);
        argv.extend(["-t", "-A", "-c", sql].map(String::from));
        let output = self.exec(target, argv, None);
        if output.success {
            Some(output.stdout.trim().to_string())
        } else {
            None
        }
    }

    fn exec(&self, target: &SqlTarget, argv: Vec<String>, stdin: Option<&str>) -> SqlOutput {
        let mut request = ExecRequest::new(target.container.clone(), argv)
            .env("PGPASSWORD", &target.password)
            .env("PGUSER", &target.user)
            .env("PGDATABASE", &target.database);
        if let Some(input) = stdin {
            request = request.stdin(input.as_bytes().to_vec());
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        match self.runtime.exec(&request) {
            Ok(output) => SqlOutput {
                success: output.success(),
                exit_code: output.exit_code(),
                stdout: output.stdout,
                stderr: output.stderr,
            },
            Err(e) => {
                tracing::debug!(container = %target.container, "psql exec failed: {}", e);
                SqlOutput::error(e.to_string())
            }
        }
    }
}

fn base_psql(target: &SqlTarget) -> Vec<String> {
    vec![
        "psql".to_string(),
        "-X".to_string(),
        "-q".to_string(),
        "-U".to_string(),
        target.user.clone(),
        "-d".to_string(),
        target.database.clone(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;
    use crate::testing::ScriptedRuntime;
    use pretty_assertions::assert_eq;

    fn target() -> SqlTarget {
        SqlTarget::new("pgh-primary-t", "postgres", "secret", "postgres")
    }

    #[test]
    fn test_run_builds_psql_c() {
        let runtime = ScriptedRuntime::new();
        runtime.push_exec(ProcessOutput::with_status(0, "CREATE EXTENSION\n", ""));
        let output = SqlRunner::new(&runtime).run("CREATE EXTENSION vector", &target());
        assert!(output.success);
        assert_eq!(output.exit_code, 0);

        let request = runtime.exec_requests().pop().unwrap();
        assert_eq!(request.container, "pgh-primary-t");
        assert_eq!(
            request.argv,
            vec![
                "psql",
                "-X",
                "-q",
                "-U",
                "postgres",
                "-d",
                "postgres",
                "-v",
                "ON_ERROR_STOP=1",
                "-c",
                "CREATE EXTENSION vector"
            ]
        );
        assert!(request
            .env
            .contains(&("PGPASSWORD".to_string(), "secret".to_string())));
    }

    #[test]
    fn test_script_goes_through_stdin() {
        let runtime = ScriptedRuntime::new();
        SqlRunner::new(&runtime).run_script("SELECT 1;\nSELECT 2;\n", &target());
        let request = runtime.exec_requests().pop().unwrap();
        assert_eq!(request.stdin.as_deref(), Some(&b"SELECT 1;\nSELECT 2;\n"[..]));
        assert_eq!(&request.argv[request.argv.len() - 2..], &["-f", "-"]);
    }

    #[test]
    fn test_nonzero_exit_is_unsuccessful_output() {
        let runtime = ScriptedRuntime::new();
        runtime.push_exec(ProcessOutput::with_status(
            3,
            "",
            "ERROR:  relation \"missing\" does not exist",
        ));
        let output = SqlRunner::new(&runtime).run("SELECT * FROM missing", &target());
        assert!(!output.success);
        assert_eq!(output.exit_code, 3);
        assert!(output.stderr.contains("does not exist"));
    }

    #[test]
    fn test_runtime_error_becomes_output() {
        let runtime = ScriptedRuntime::new();
        runtime.fail_exec("docker daemon unavailable");
        let output = SqlRunner::new(&runtime).run("SELECT 1", &target());
        assert!(!output.success);
        assert_eq!(output.exit_code, -1);
        assert!(output.stderr.contains("docker daemon unavailable"));
    }

    #[test]
    fn test_missing_file_becomes_output() {
        let runtime = ScriptedRuntime::new();
        let output =
            SqlRunner::new(&runtime).run_file(Path::new("/nonexistent/setup.sql"), &target());
        assert!(!output.success);
        assert!(runtime.exec_requests().is_empty());
    }

    #[test]
    fn test_regression_mode_echoes() {
        let runtime = ScriptedRuntime::new();
        SqlRunner::new(&runtime).run_regression("SELECT 1;\n", &target());
        let request = runtime.exec_requests().pop().unwrap();
        assert_eq!(request.argv[0], "sh");
        assert!(request.argv[2].contains("psql -X -a -q"));
        assert!(request
            .env
            .contains(&("PGDATABASE".to_string(), "postgres".to_string())));
    }

    #[test]
    fn test_query_scalar() {
        let runtime = ScriptedRuntime::new();
        runtime.push_exec(ProcessOutput::with_status(0, " f \n", ""));
        runtime.push_exec(ProcessOutput::with_status(2, "", "could not connect"));
        let runner = SqlRunner::new(&runtime);
        assert_eq!(
            runner.query_scalar("SELECT pg_is_in_recovery()", &target()),
            Some("f".to_string())
        );
        assert_eq!(runner.query_scalar("SELECT 1", &target()), None);
    }
}
