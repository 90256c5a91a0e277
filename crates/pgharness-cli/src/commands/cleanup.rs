//! Cleanup command implementation
//!
//! Removes resources left behind by a run that died before its own teardown.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;

use pgharness_docker::{cleanup_run, CancellationToken, CleanupReport, DockerCli, SystemRunner};

use crate::exit::EXIT_FAILURE;

/// Run the cleanup command
///
/// # Returns
/// Exit code: 0 if everything labeled with `run_id` was removed, 1 otherwise
pub fn run(run_id: &str) -> Result<ExitCode> {
    let runner = Arc::new(SystemRunner::new(CancellationToken::new()));
    let docker = DockerCli::locate(None, runner).context("docker is required for cleanup")?;
    let report = cleanup_run(&docker, run_id)
        .with_context(|| format!("failed to list resources of run {}", run_id))?;
    print_report(run_id, &report);
    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_FAILURE))
    }
}

fn print_report(run_id: &str, report: &CleanupReport) {
    println!("{} run {}", "Cleanup:".cyan().bold(), run_id);
    if report.removed.is_empty() && report.errors.is_empty() {
        println!("  {} nothing to remove", "ok".green());
        return;
    }
    for name in &report.removed {
        println!("  {} removed {}", "ok".green(), name);
    }
    for (name, error) in &report.errors {
        println!("  {} {}: {}", "!!".red(), name, error);
    }
}
