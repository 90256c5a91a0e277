//! Human-readable rendering shared by `run` and `report`.

use colored::Colorize;
use pgharness_model::{RunSummary, TestResult};

/// One status line per result.
pub(crate) fn result_lines(results: &[TestResult]) -> Vec<String> {
    results
        .iter()
        .map(|result| {
            let status = if result.passed {
                "ok".green()
            } else if result.is_known_failure() {
                "xfail".yellow()
            } else {
                "FAIL".red().bold()
            };
            let suite = result
                .suite
                .as_deref()
                .map(|s| format!("[{}] ", s))
                .unwrap_or_default();
            format!(
                "  {} {}{} {}",
                status,
                suite.dimmed(),
                result.name,
                format!("({}ms)", result.duration_ms).dimmed()
            )
        })
        .collect()
}

/// Error message and diff of every failure that counts against the run.
pub(crate) fn failure_details(results: &[TestResult]) -> Vec<String> {
    let mut lines = Vec::new();
    for result in results.iter().filter(|r| r.is_failure()) {
        lines.push(String::new());
        lines.push(format!("{} {}", "Failed:".red().bold(), result.name));
        if let Some(error) = &result.error {
            lines.push(format!("  {}", error));
        }
        if let Some(diff) = &result.diff {
            lines.extend(diff.lines().map(colorize_diff_line));
        }
    }
    lines
}

/// Totals line, plus per-suite counts when more than one suite ran.
pub(crate) fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let mut lines = Vec::new();
    if summary.by_suite.len() > 1 {
        for suite in &summary.by_suite {
            lines.push(format!(
                "  {:<12} {} passed, {} failed, {} known failure(s)",
                suite.name, suite.passed, suite.failed, suite.known_failures
            ));
        }
    }

    let counts = format!(
        "{} passed, {} failed, {} known failure(s) of {} ({}ms)",
        summary.passed, summary.failed, summary.known_failures, summary.total, summary.duration_ms
    );
    let verdict = if summary.is_success() {
        "SUCCESS".green().bold()
    } else {
        "FAILED".red().bold()
    };
    lines.push(format!("{} {}", verdict, counts));
    lines
}

/// Colors one line of a unified diff.
pub(crate) fn colorize_diff_line(line: &str) -> String {
    if line.starts_with("---") || line.starts_with("+++") {
        line.bold().to_string()
    } else if line.starts_with("@@") {
        line.cyan().to_string()
    } else if line.starts_with('-') {
        line.red().to_string()
    } else if line.starts_with('+') {
        line.green().to_string()
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgharness_model::aggregate;

    fn results() -> Vec<TestResult> {
        vec![
            TestResult::pass("extensions_load", 40).in_suite("core"),
            TestResult::fail("vector_basic", 12, "output differs from expected")
                .with_diff("--- expected\n+++ actual\n@@ -1,1 +1,1 @@\n-3\n+4\n")
                .in_suite("extension"),
            TestResult::fail("pgsodium_vault", 8, "output differs from expected")
                .mark_known_failure("needs a server key")
                .in_suite("interaction"),
        ]
    }

    #[test]
    fn test_result_lines() {
        let lines = result_lines(&results());
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("ok"));
        assert!(lines[0].contains("extensions_load"));
        assert!(lines[1].contains("FAIL"));
        assert!(lines[2].contains("xfail"));
    }

    #[test]
    fn test_failure_details_skip_known_failures() {
        let text = failure_details(&results()).join("\n");
        assert!(text.contains("vector_basic"));
        assert!(text.contains("output differs from expected"));
        assert!(text.contains("+4"));
        assert!(!text.contains("pgsodium_vault"));
    }

    #[test]
    fn test_summary_lines() {
        let summary = aggregate(&results());
        let lines = summary_lines(&summary);
        assert_eq!(lines.len(), 4);
        let last = lines.last().unwrap();
        assert!(last.contains("FAILED"));
        assert!(last.contains("1 passed, 1 failed, 1 known failure(s) of 3"));
    }

    #[test]
    fn test_single_suite_has_no_breakdown() {
        let summary = aggregate(&[TestResult::pass("a", 1).in_suite("core")]);
        let lines = summary_lines(&summary);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("SUCCESS"));
    }
}
