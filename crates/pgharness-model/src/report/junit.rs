//! JUnit XML export.

use std::fmt::Write;

use super::summary::{aggregate, DEFAULT_SUITE};
use super::TestResult;

/// Renders results as a JUnit `testsuites` document.
///
/// One `testsuite` per suite in first-seen order. Failures carry the error as
/// the `message` attribute and the diff as element text. Known failures are
/// written as `skipped` so CI shows them without failing the build.
pub fn to_junit_xml(results: &[TestResult]) -> String {
    let summary = aggregate(results);
    let mut xml = String::new();

    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        xml,
        "<testsuites name=\"pgharness\" tests=\"{}\" failures=\"{}\" skipped=\"{}\" time=\"{}\">",
        summary.total,
        summary.failed,
        summary.known_failures,
        seconds(summary.duration_ms)
    );

    for suite in &summary.by_suite {
        let _ = writeln!(
            xml,
            "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" skipped=\"{}\" time=\"{}\">",
            escape_xml(&suite.name),
            suite.total,
            suite.failed,
            suite.known_failures,
            seconds(suite.duration_ms)
        );

        let members = results
            .iter()
            .filter(|r| r.suite.as_deref().unwrap_or(DEFAULT_SUITE) == suite.name);
        for result in members {
            write_testcase(&mut xml, &suite.name, result);
        }

        xml.push_str("  </testsuite>\n");
    }

    xml.push_str("</testsuites>\n");
    xml
}

fn write_testcase(xml: &mut String, suite: &str, result: &TestResult) {
    let _ = write!(
        xml,
        "    <testcase name=\"{}\" classname=\"{}\" time=\"{}\"",
        escape_xml(&result.name),
        escape_xml(suite),
        seconds(result.duration_ms)
    );

    if result.passed {
        xml.push_str("/>\n");
        return;
    }
    xml.push_str(">\n");

    if let Some(reason) = &result.known_failure {
        let _ = writeln!(
            xml,
            "      <skipped message=\"known failure: {}\"/>",
            escape_xml(reason)
        );
    } else {
        let message = result.error.as_deref().unwrap_or("test failed");
        match &result.diff {
            Some(diff) => {
                let _ = writeln!(
                    xml,
                    "      <failure message=\"{}\">{}</failure>",
                    escape_xml(message),
                    escape_xml(diff)
                );
            }
            None => {
                let _ = writeln!(xml, "      <failure message=\"{}\"/>", escape_xml(message));
            }
        }
    }

    xml.push_str("    </testcase>\n");
}

fn seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

/// Escapes text for use in XML attributes and element content.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // XML 1.0 forbids most control characters outright.
            c if (c as u32) < 0x20 && c != '\n' && c != '\r' && c != '\t' => {}
            c => out.push(c),
        }
    }
    out
}
