//! pgharness CLI - PostgreSQL extension regression harness
//!
//! This binary validates extension manifests, runs pg_regress-style tests
//! against a disposable PostgreSQL container, and merges result files.

use std::process::ExitCode;

use clap::Parser;

use pgharness_cli::{commands, exit_code_for, logging};

mod cli_args;

use cli_args::{Cli, Commands};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // help and version exit 0, usage errors exit 2
            let _ = e.print();
            return ExitCode::from(e.exit_code() as u8);
        }
    };
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Validate { manifest, json } => commands::validate::run(&manifest, json),
        Commands::Order { manifest, json } => commands::order::run(&manifest, json),
        Commands::Preload {
            manifest,
            mode,
            with,
        } => commands::preload::run(&manifest, mode, &with),
        Commands::List {
            manifest,
            catalog,
            mode,
            tiers,
            filter,
            json,
        } => commands::list::run(
            &manifest,
            catalog.as_deref(),
            mode,
            &tiers,
            filter.as_deref(),
            json,
        ),
        Commands::Diff {
            expected,
            actual,
            context,
        } => commands::diff::run(&expected, &actual, context),
        Commands::Run(args) => commands::run::run(&args),
        Commands::Report {
            files,
            format,
            output,
        } => commands::report::run(&files, format, output.as_deref()),
        Commands::Doctor => commands::doctor::run(),
        Commands::Cleanup { run_id } => commands::cleanup::run(&run_id),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            exit_code_for(&e)
        }
    }
}
