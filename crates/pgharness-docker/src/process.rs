//! Typed subprocess invocation.
//!
//! Every external command (docker, docker compose, psql via docker exec) is
//! described as a [`ProcessSpec`] holding an argv vector. Nothing is ever
//! passed through a host shell.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::cancel::CancellationToken;

/// Interval between `try_wait` checks.
const WAIT_POLL: Duration = Duration::from_millis(50);

/// A command to run: program, argv, environment, optional stdin and bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Program to execute.
    pub program: PathBuf,
    /// Arguments, one element per argv entry.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Bytes written to the child's stdin, which is then closed.
    pub stdin: Option<Vec<u8>>,
    /// Kill the child if it runs longer than this.
    pub timeout: Option<Duration>,
}

impl ProcessSpec {
    /// Creates a spec for `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
            timeout: None,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Feeds `input` to the child's stdin.
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Bounds the child's run time.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Renders the command line for logs and error messages.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().map(|a| {
            if a.is_empty() || a.contains(char::is_whitespace) {
                format!("'{}'", a)
            } else {
                a.clone()
            }
        }));
        parts.join(" ")
    }
}

/// Captured result of a finished child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the child was terminated by a signal.
    pub status_code: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl ProcessOutput {
    /// Creates an output with the given exit code.
    pub fn with_status(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            status_code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the child exited with status 0.
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    /// Exit code, or -1 when there is none.
    pub fn exit_code(&self) -> i32 {
        self.status_code.unwrap_or(-1)
    }
}

/// Errors raised by the process layer.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The child exceeded its time bound and was killed.
    #[error("'{command}' timed out after {timeout_secs} seconds")]
    Timeout { command: String, timeout_secs: u64 },

    /// The run was cancelled while the child was running; it was killed.
    #[error("'{command}' was cancelled")]
    Cancelled { command: String },

    /// I/O error while talking to the child.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs process specs.
///
/// The seam that lets the container layer be exercised without Docker.
pub trait CommandRunner: Send + Sync {
    /// Runs the command to completion and captures its output.
    fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    cancel: CancellationToken,
}

impl SystemRunner {
    /// Creates a runner that kills children when `cancel` is flipped.
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError> {
        tracing::trace!(command = %spec.display(), "spawning");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k, v)))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: spec.program.display().to_string(),
            source,
        })?;

        // Writer and readers run on their own threads so a full pipe in either
        // direction cannot stall the child.
        let writer = match (spec.stdin.clone(), child.stdin.take()) {
            (Some(input), Some(mut pipe)) => Some(std::thread::spawn(move || {
                let _ = pipe.write_all(&input);
            })),
            _ => None,
        };
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let status = wait_with_timeout(&mut child, spec, &self.cancel)?;

        if let Some(writer) = writer {
            let _ = writer.join();
        }
        let output = ProcessOutput {
            status_code: status.code(),
            stdout: join_reader(stdout),
            stderr: join_reader(stderr),
        };
        tracing::trace!(command = %spec.display(), code = ?output.status_code, "finished");
        Ok(output)
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

fn wait_with_timeout(
    child: &mut Child,
    spec: &ProcessSpec,
    cancel: &CancellationToken,
) -> Result<ExitStatus, ProcessError> {
    let start = Instant::now();

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if cancel.is_cancelled() {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ProcessError::Cancelled {
                        command: spec.display(),
                    });
                }
                if let Some(timeout) = spec.timeout {
                    if start.elapsed() > timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(ProcessError::Timeout {
                            command: spec.display(),
                            timeout_secs: timeout.as_secs(),
                        });
                    }
                }
                std::thread::sleep(WAIT_POLL);
            }
            Err(e) => return Err(ProcessError::Io(e)),
        }
    }
}
