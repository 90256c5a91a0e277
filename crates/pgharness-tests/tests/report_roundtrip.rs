//! Result files: JSONL round trips, cross-run merges, and JUnit export.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pgharness-tests --test report_roundtrip
//! ```

use pretty_assertions::assert_eq;

use pgharness_model::aggregate;
use pgharness_model::report::{
    export, merge_runs, parse_jsonl, to_jsonl, write_export, TestResult,
};
use pgharness_model::ExportFormat;
use pgharness_tests::harness::TestHarness;

fn run_a() -> Vec<TestResult> {
    vec![
        TestResult::pass("core_types", 12).in_suite("core"),
        TestResult::fail("vector_basic", 40, "output differs from expected")
            .with_diff("--- expected\n+++ actual\n@@ -1,1 +1,1 @@\n-1\n+2\n")
            .in_suite("extension"),
    ]
}

fn run_b() -> Vec<TestResult> {
    vec![
        TestResult::pass("postgis_basic", 30)
            .with_metric("rows", 3.0)
            .in_suite("extension"),
        TestResult::fail("pgsodium_vault", 8, "output differs from expected")
            .in_suite("interaction")
            .mark_known_failure("needs a server key"),
    ]
}

/// Reading back a written file gives the same name, status, and duration.
#[test]
fn test_jsonl_preserves_fields() {
    let results = run_a();
    let text = to_jsonl(&results).unwrap();
    assert_eq!(text.lines().count(), 2);

    let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
    assert_eq!(first["name"], "core_types");
    assert_eq!(first["passed"], true);
    assert_eq!(first["duration"], 12);
    assert!(first.get("error").is_none());
    assert!(first.get("diff").is_none());

    let parsed = parse_jsonl(&text).unwrap();
    assert_eq!(parsed, results);
}

/// Unknown fields from newer writers are ignored; blank lines are skipped.
#[test]
fn test_jsonl_tolerates_extra_fields_and_blank_lines() {
    let text = "\n{\"name\":\"a\",\"passed\":true,\"duration\":5,\"host\":\"ci-3\"}\n\n";
    let parsed = parse_jsonl(text).unwrap();
    assert_eq!(parsed, vec![TestResult::pass("a", 5)]);
}

/// A malformed line names its 1-based line number.
#[test]
fn test_jsonl_reports_bad_line() {
    let text = "{\"name\":\"a\",\"passed\":true,\"duration\":5}\nnot json\n";
    let err = parse_jsonl(text).unwrap_err();
    assert!(err.to_string().contains("line 2"), "{}", err);
}

/// Merging two runs keeps file order and both runs' results.
#[test]
fn test_merge_runs_in_order() {
    let harness = TestHarness::new();
    let a = harness.path().join("a.jsonl");
    let b = harness.path().join("b.jsonl");
    write_export(&a, &run_a(), ExportFormat::Jsonl).unwrap();
    write_export(&b, &run_b(), ExportFormat::Jsonl).unwrap();

    let merged = merge_runs(&[&a, &b]).unwrap();
    let names: Vec<&str> = merged.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["core_types", "vector_basic", "postgis_basic", "pgsodium_vault"]
    );

    let summary = aggregate(&merged);
    assert_eq!(summary.total, 4);
    assert_eq!(summary.passed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.known_failures, 1);
    assert_eq!(summary.duration_ms, 90);
    assert!(!summary.is_success());
    let suites: Vec<&str> = summary.by_suite.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(suites, vec!["core", "extension", "interaction"]);
}

/// A missing input file fails the merge.
#[test]
fn test_merge_missing_file_fails() {
    let harness = TestHarness::new();
    let missing = harness.path().join("nope.jsonl");
    assert!(merge_runs(&[&missing]).is_err());
}

/// JUnit output has one suite per tier, failures with diffs, and known
/// failures as skipped.
#[test]
fn test_junit_export() {
    let mut results = run_a();
    results.extend(run_b());
    let xml = export(&results, ExportFormat::Junit).unwrap();

    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(xml.contains("<testsuites name=\"pgharness\" tests=\"4\" failures=\"1\" skipped=\"1\""));
    assert!(xml.contains("<testsuite name=\"extension\" tests=\"2\" failures=\"1\""));
    assert!(xml.contains("<testcase name=\"core_types\" classname=\"core\" time=\"0.012\"/>"));
    assert!(xml.contains("<failure message=\"output differs from expected\">--- expected"));
    assert!(xml.contains("<skipped message=\"known failure: needs a server key\"/>"));
}

/// Results with characters special to XML are escaped.
#[test]
fn test_junit_escapes_text() {
    let results = vec![TestResult::fail("a<b", 1, "expected \"x\" & got 'y'")];
    let xml = export(&results, ExportFormat::Junit).unwrap();
    assert!(xml.contains("name=\"a&lt;b\""));
    assert!(xml.contains("&quot;x&quot; &amp; got &apos;y&apos;"));
}
