//! Doctor command implementation
//!
//! Checks that docker is installed and reachable and shows the environment
//! overrides in effect.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;

use pgharness_docker::{find_docker, CancellationToken, DockerCli, SystemRunner, DOCKER_ENV};
use pgharness_model::TEST_MODE_ENV;

use crate::config::IMAGE_ENV;
use crate::exit::EXIT_FAILURE;
use crate::logging::LOG_ENV;

/// Run the doctor command
///
/// Checks:
/// - docker binary (PGH_DOCKER or PATH)
/// - docker daemon reachable
/// - docker compose plugin (needed only for replication stacks)
///
/// # Returns
/// Exit code: 0 if docker is usable, 1 otherwise
pub fn run() -> Result<ExitCode> {
    println!("{}", "pgharness Doctor".cyan().bold());
    println!("{}", "================".cyan());
    println!();

    println!("{}", "Versions:".bold());
    println!(
        "  {} pgharness-cli v{}",
        "->".green(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    let mut all_ok = true;
    println!("{}", "Dependencies:".bold());
    match find_docker(None) {
        Ok(binary) => {
            println!("  {} docker ({})", "ok".green(), binary.display());
            let runner = Arc::new(SystemRunner::new(CancellationToken::new()));
            let docker = DockerCli::new(binary, runner);
            match docker.server_version() {
                Ok(version) => println!("  {} docker daemon {}", "ok".green(), version),
                Err(e) => {
                    println!("  {} docker daemon unreachable: {}", "!!".red(), e);
                    all_ok = false;
                }
            }
            if docker.has_compose() {
                println!("  {} docker compose", "ok".green());
            } else {
                println!("  {} docker compose not available", "!!".yellow());
                println!(
                    "     {}",
                    "Only needed for multi-container (replication) stacks.".dimmed()
                );
            }
        }
        Err(e) => {
            println!("  {} {}", "!!".red(), e);
            println!(
                "     {}",
                format!("Install docker or point {} at the binary.", DOCKER_ENV).dimmed()
            );
            all_ok = false;
        }
    }
    println!();

    println!("{}", "Environment:".bold());
    for key in [DOCKER_ENV, IMAGE_ENV, TEST_MODE_ENV, LOG_ENV] {
        match env::var(key) {
            Ok(value) => println!("  {} {}={}", "->".green(), key, value),
            Err(_) => println!("  {} {} {}", "->".dimmed(), key, "(unset)".dimmed()),
        }
    }
    println!();

    if all_ok {
        println!("{} docker is ready", "SUCCESS".green().bold());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{} docker is not usable", "FAILED".red().bold());
        Ok(ExitCode::from(EXIT_FAILURE))
    }
}
