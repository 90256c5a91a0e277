//! Report command implementation
//!
//! Merges JSONL result files from earlier runs, prints the combined summary,
//! and re-exports the merged results.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};

use pgharness_model::{aggregate, report, ExportFormat};

use super::reporting;
use crate::exit::{UsageResultExt, EXIT_FAILURE};

/// Run the report command
///
/// The export goes to `output` when given, else to stdout; the summary then
/// goes to stderr so stdout stays machine-readable.
///
/// # Returns
/// Exit code: 0 if the merged runs have no failures, 1 otherwise
pub fn run(files: &[PathBuf], format: ExportFormat, output: Option<&Path>) -> Result<ExitCode> {
    let results = report::merge_runs(files).usage_context(|| "failed to read result files")?;
    let text = report::export(&results, format).context("failed to render results")?;

    let summary_lines = reporting::summary_lines(&aggregate(&results));
    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            for line in reporting::failure_details(&results) {
                println!("{}", line);
            }
            for line in &summary_lines {
                println!("{}", line);
            }
        }
        None => {
            print!("{}", text);
            for line in &summary_lines {
                eprintln!("{}", line);
            }
        }
    }

    if results.iter().any(|r| r.is_failure()) {
        Ok(ExitCode::from(EXIT_FAILURE))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
