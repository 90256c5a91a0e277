//! Test results, run summaries, and export formats.
//!
//! Results are produced by the regression comparator and the tier
//! orchestrator, accumulated in a [`ResultAccumulator`], and exported as
//! line-delimited JSON or JUnit XML. JSONL files from several runs can be read
//! back and merged for cross-run reports.

mod jsonl;
mod junit;
mod result;
mod summary;


pub use jsonl::{merge_runs, parse_jsonl, read_jsonl, to_jsonl, ReportError};
pub use junit::{escape_xml, to_junit_xml};
pub use result::TestResult;
pub use summary::{aggregate, ResultAccumulator, RunSummary, SuiteSummary, DEFAULT_SUITE};

use serde::{Deserialize, Serialize};

/// Result export format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// One JSON record per line.
    #[default]
    Jsonl,
    /// JUnit XML.
    Junit,
}

impl ExportFormat {
    /// Returns the string identifier for this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Jsonl => "jsonl",
            ExportFormat::Junit => "junit",
        }
    }

    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Jsonl => "jsonl",
            ExportFormat::Junit => "xml",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jsonl" | "json" => Ok(ExportFormat::Jsonl),
            "junit" | "xml" => Ok(ExportFormat::Junit),
            other => Err(format!("unknown export format '{}'", other)),
        }
    }
}

/// Renders results in the requested format.
pub fn export(results: &[TestResult], format: ExportFormat) -> Result<String, ReportError> {
    match format {
        ExportFormat::Jsonl => to_jsonl(results),
        ExportFormat::Junit => Ok(to_junit_xml(results)),
    }
}

/// Writes results to a file in the requested format.
pub fn write_export(
    path: impl AsRef<std::path::Path>,
    results: &[TestResult],
    format: ExportFormat,
) -> Result<(), ReportError> {
    let path = path.as_ref();
    let text = export(results, format)?;
    std::fs::write(path, text).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
