//! Exit codes and the usage-error marker.
//!
//! An invalid manifest is a failed check for `validate` (exit 1), since
//! checking it is the command's job. Every other command treats the manifest
//! as an input, so the same manifest makes them exit 2.

use std::fmt;
use std::process::ExitCode;

/// One or more tests failed, or the run hit an infrastructure failure.
pub const EXIT_FAILURE: u8 = 1;

/// The invocation was invalid: bad flags, or unreadable or invalid inputs.
pub const EXIT_USAGE: u8 = 2;

/// Marks an error as the caller's fault rather than the run's.
///
/// Anywhere in an `anyhow` chain, it turns exit code 1 into 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError(pub String);

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UsageError {}

/// Builds a usage error from a message.
pub fn usage(message: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(UsageError(message.into()))
}

/// Like `anyhow::Context`, but marks the error as a usage error.
pub trait UsageResultExt<T> {
    fn usage_context<C, F>(self, context: F) -> anyhow::Result<T>
    where
        C: fmt::Display,
        F: FnOnce() -> C;
}

impl<T, E> UsageResultExt<T> for Result<T, E>
where
    E: fmt::Display,
{
    fn usage_context<C, F>(self, context: F) -> anyhow::Result<T>
    where
        C: fmt::Display,
        F: FnOnce() -> C,
    {
        self.map_err(|e| usage(format!("{}: {:#}", context(), e)))
    }
}

/// Exit code for an error returned by a command.
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if is_usage(err) {
        ExitCode::from(EXIT_USAGE)
    } else {
        ExitCode::from(EXIT_FAILURE)
    }
}

fn is_usage(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<UsageError>())
}
