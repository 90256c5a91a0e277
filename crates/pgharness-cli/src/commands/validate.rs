//! Validate command implementation
//!
//! Checks a manifest for duplicate, empty, dangling, and circular entries
//! without starting anything.

use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use pgharness_model::{load_manifest, validate_manifest, HarnessError, ManifestError};

use crate::exit::{usage, EXIT_FAILURE};

/// One reported problem.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Finding {
    code: &'static str,
    message: String,
    entry: Option<String>,
}

impl Finding {
    fn to_json(&self) -> serde_json::Value {
        json!({ "code": self.code, "message": self.message, "entry": self.entry })
    }

    fn render(&self) -> String {
        match &self.entry {
            Some(entry) => format!("{} [{}]: {}", self.code, entry, self.message),
            None => format!("{}: {}", self.code, self.message),
        }
    }
}

/// Outcome of checking one manifest file.
#[derive(Debug, Clone, Default)]
struct Report {
    entries: usize,
    errors: Vec<Finding>,
    warnings: Vec<Finding>,
}

impl Report {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Run the validate command
///
/// # Returns
/// Exit code: 0 if valid, 1 if invalid, 2 if the file cannot be read
pub fn run(manifest_path: &Path, json_output: bool) -> Result<ExitCode> {
    let start = Instant::now();
    let report = check(manifest_path)?;
    let duration_ms = start.elapsed().as_millis() as u64;

    if json_output {
        let output = json!({
            "ok": report.is_ok(),
            "entries": report.entries,
            "errors": report.errors.iter().map(Finding::to_json).collect::<Vec<_>>(),
            "warnings": report.warnings.iter().map(Finding::to_json).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_human(manifest_path, &report, duration_ms);
    }

    if report.is_ok() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_FAILURE))
    }
}

/// Unreadable files are usage errors; malformed content is a finding.
fn check(path: &Path) -> Result<Report> {
    let manifest = match load_manifest(path) {
        Ok(manifest) => manifest,
        Err(e @ ManifestError::JsonParse(_)) => {
            return Ok(Report {
                errors: vec![Finding {
                    code: e.code(),
                    message: e.to_string(),
                    entry: None,
                }],
                ..Report::default()
            });
        }
        Err(e) => return Err(usage(e.to_string())),
    };

    let result = validate_manifest(&manifest);
    Ok(Report {
        entries: manifest.len(),
        errors: result
            .errors
            .iter()
            .map(|e| Finding {
                code: e.code.code(),
                message: e.message.clone(),
                entry: e.entry.clone(),
            })
            .collect(),
        warnings: result
            .warnings
            .iter()
            .map(|w| Finding {
                code: w.code.code(),
                message: w.message.clone(),
                entry: w.entry.clone(),
            })
            .collect(),
    })
}

fn print_human(path: &Path, report: &Report, duration_ms: u64) {
    println!("{} {}", "Validating:".cyan().bold(), path.display());

    for error in &report.errors {
        println!("  {} {}", "x".red(), error.render());
    }
    for warning in &report.warnings {
        println!("  {} {}", "!".yellow(), warning.render());
    }

    if report.is_ok() {
        println!(
            "\n{} Manifest is valid: {} entries ({}ms)",
            "SUCCESS".green().bold(),
            report.entries,
            duration_ms
        );
    } else {
        println!(
            "\n{} Manifest has {} error(s) ({}ms)",
            "FAILED".red().bold(),
            report.errors.len(),
            duration_ms
        );
    }
}
