//! Line-delimited JSON export and import.

use std::path::{Path, PathBuf};

use super::TestResult;
use crate::error::HarnessError;

/// Errors raised while reading or writing result files.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// A line could not be parsed as a result record.
    #[error("{}line {line}: invalid result record: {source}", display_origin(.origin))]
    Parse {
        origin: Option<PathBuf>,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A result could not be serialized.
    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A result file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn display_origin(origin: &Option<PathBuf>) -> String {
    match origin {
        Some(path) => format!("{}: ", path.display()),
        None => String::new(),
    }
}

impl HarnessError for ReportError {
    fn code(&self) -> &'static str {
        match self {
            ReportError::Parse { .. } => "REPORT_001",
            ReportError::Serialize(_) => "REPORT_002",
            ReportError::Io { .. } => "REPORT_003",
        }
    }

    fn category(&self) -> &'static str {
        "report"
    }
}

/// Serializes results as one JSON object per line.
pub fn to_jsonl(results: &[TestResult]) -> Result<String, ReportError> {
    let mut out = String::new();
    for result in results {
        out.push_str(&serde_json::to_string(result)?);
        out.push('\n');
    }
    Ok(out)
}

/// Parses JSONL text. Blank lines are skipped; line numbers in errors are 1-based.
pub fn parse_jsonl(text: &str) -> Result<Vec<TestResult>, ReportError> {
    parse_lines(text, None)
}

fn parse_lines(text: &str, origin: Option<&Path>) -> Result<Vec<TestResult>, ReportError> {
    let mut results = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let result = serde_json::from_str(line).map_err(|source| ReportError::Parse {
            origin: origin.map(Path::to_path_buf),
            line: idx + 1,
            source,
        })?;
        results.push(result);
    }
    Ok(results)
}

/// Reads a JSONL result file.
pub fn read_jsonl(path: impl AsRef<Path>) -> Result<Vec<TestResult>, ReportError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_lines(&text, Some(path))
}

/// Concatenates several JSONL files in the order given.
pub fn merge_runs<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<TestResult>, ReportError> {
    let mut merged = Vec::new();
    for path in paths {
        merged.extend(read_jsonl(path)?);
    }
    Ok(merged)
}
