//! Diff command implementation
//!
//! Compares two captured outputs offline, the way a regression test would.

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;

use pgharness_regress::diff_outputs;

use super::reporting::colorize_diff_line;
use crate::exit::{UsageResultExt, EXIT_FAILURE};

/// Run the diff command
///
/// # Returns
/// Exit code: 0 if the outputs match after normalization, 1 if they differ
pub fn run(expected: &Path, actual: &Path, context: usize) -> Result<ExitCode> {
    let expected_text = fs::read_to_string(expected)
        .usage_context(|| format!("failed to read {}", expected.display()))?;
    let actual_text = fs::read_to_string(actual)
        .usage_context(|| format!("failed to read {}", actual.display()))?;

    match diff_outputs(&expected_text, &actual_text, context) {
        None => {
            println!("{} outputs match", "ok".green());
            Ok(ExitCode::SUCCESS)
        }
        Some(diff) => {
            for line in diff.lines() {
                println!("{}", colorize_diff_line(line));
            }
            Ok(ExitCode::from(EXIT_FAILURE))
        }
    }
}
