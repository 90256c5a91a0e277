//! pgharness CLI library.
//!
//! Command implementations, configuration loading, and logging setup for
//! the `pgharness` binary. Each command returns an exit code; errors carry a
//! [`UsageError`] marker when the invocation itself was at fault.

pub mod commands;
pub mod config;
pub mod exit;
pub mod logging;

pub use config::HarnessConfig;
pub use exit::{exit_code_for, UsageError, UsageResultExt, EXIT_FAILURE, EXIT_USAGE};
