//! Exit codes and output of the pgharness binary.
//!
//! 0 means success, 1 a failed check or test, 2 an invalid invocation.
//! None of these tests needs docker: every `run` case here fails while
//! resolving inputs, before a container runtime is looked up.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pgharness-tests --test cli_exit_codes
//! ```

use pretty_assertions::assert_eq;

use pgharness_model::report::{to_jsonl, TestResult};
use pgharness_model::ManifestEntry;
use pgharness_tests::fixtures::{small_manifest, RegressTree};
use pgharness_tests::harness::TestHarness;

fn path(p: &std::path::Path) -> &str {
    p.to_str().unwrap()
}

// ============================================================================
// validate
// ============================================================================

#[test]
fn test_validate_ok_exits_zero() {
    let harness = TestHarness::new();
    let tree = RegressTree::new();
    let manifest = tree.write_manifest(&small_manifest());

    let result = harness.validate_manifest(&manifest);
    result.assert_success();
    assert!(result.stdout.contains("SUCCESS"));
    assert!(result.stdout.contains("7 entries"));
}

#[test]
fn test_validate_json_output() {
    let harness = TestHarness::new();
    let tree = RegressTree::new();
    let manifest = tree.write_manifest(&[
        ManifestEntry::extension("postgis_topology").depends_on("postgis"),
    ]);

    let result = harness.run_cli(&["validate", "--manifest", path(&manifest), "--json"]);
    result.assert_exit_code(1);
    let report: serde_json::Value = serde_json::from_str(&result.stdout).unwrap();
    assert_eq!(report["ok"], false);
    assert_eq!(report["errors"][0]["code"], "M004");
    assert_eq!(report["errors"][0]["entry"], "postgis_topology");
}

#[test]
fn test_validate_malformed_json_exits_one() {
    let harness = TestHarness::new();
    let tree = RegressTree::new();
    let manifest = tree.write_manifest_text("{\"extensions\": [");

    let result = harness.validate_manifest(&manifest);
    result.assert_exit_code(1);
    assert!(result.stdout.contains("MANIFEST_002"));
}

#[test]
fn test_validate_missing_file_exits_two() {
    let harness = TestHarness::new();
    let missing = harness.path().join("missing.json");

    let result = harness.validate_manifest(&missing);
    result.assert_exit_code(2);
    assert!(result.stderr.contains("error"));
}

// ============================================================================
// Invocation errors
// ============================================================================

#[test]
fn test_unknown_flag_exits_two() {
    let harness = TestHarness::new();
    let result = harness.run_cli(&["validate", "--manifest", "m.json", "--frobnicate"]);
    result.assert_exit_code(2);
}

#[test]
fn test_unknown_subcommand_exits_two() {
    let harness = TestHarness::new();
    harness.run_cli(&["explode"]).assert_exit_code(2);
}

#[test]
fn test_help_exits_zero() {
    let harness = TestHarness::new();
    let result = harness.run_cli(&["--help"]);
    result.assert_success();
    assert!(result.stdout.contains("run"));
    assert!(result.stdout.contains("validate"));
}

#[test]
fn test_run_with_missing_fixtures_exits_two() {
    let harness = TestHarness::new();
    let tree = RegressTree::new();
    let manifest = tree.write_manifest(&small_manifest());
    let missing = harness.path().join("no-such-tree");

    let result = harness.run_cli(&[
        "run",
        "--manifest",
        path(&manifest),
        "--fixtures",
        path(&missing),
    ]);
    result.assert_exit_code(2);
}

#[test]
fn test_run_with_tool_preload_exits_two() {
    let harness = TestHarness::new();
    let tree = RegressTree::new();
    let manifest = tree.write_manifest(&small_manifest());

    let result = harness.run_cli(&[
        "run",
        "--manifest",
        path(&manifest),
        "--fixtures",
        path(tree.path()),
        "--with",
        "pgbackrest",
    ]);
    result.assert_exit_code(2);
    assert!(result.stderr.contains("pgbackrest"), "{}", result.stderr);
}

#[test]
fn test_invalid_manifest_fails_validate_but_rejects_run() {
    let harness = TestHarness::new();
    let tree = RegressTree::new();
    let manifest = tree.write_manifest(&[
        ManifestEntry::extension("postgis_topology").depends_on("postgis"),
    ]);

    harness.validate_manifest(&manifest).assert_exit_code(1);
    let result = harness.run_cli(&[
        "run",
        "--manifest",
        path(&manifest),
        "--fixtures",
        path(tree.path()),
    ]);
    result.assert_exit_code(2);
    assert!(result.stderr.contains("invalid manifest"), "{}", result.stderr);
}

#[test]
fn test_run_with_bad_filter_exits_two() {
    let harness = TestHarness::new();
    let tree = RegressTree::new();
    let manifest = tree.write_manifest(&small_manifest());

    let result = harness.run_cli(&[
        "run",
        "--manifest",
        path(&manifest),
        "--fixtures",
        path(tree.path()),
        "--filter",
        "core_(",
    ]);
    result.assert_exit_code(2);
}

// ============================================================================
// preload / list / diff
// ============================================================================

#[test]
fn test_preload_prints_libraries() {
    let harness = TestHarness::new();
    let tree = RegressTree::new();
    let manifest = tree.write_manifest(&small_manifest());

    let result = harness.run_cli(&[
        "preload",
        "--manifest",
        path(&manifest),
        "--mode",
        "production",
        "--with",
        "pg_cron",
    ]);
    result.assert_success();
    assert_eq!(result.stdout.trim(), "timescaledb,pg_cron");
}

#[test]
fn test_list_json_shows_skips() {
    let harness = TestHarness::new();
    let tree = RegressTree::new();
    let manifest = tree.write_manifest(&small_manifest());

    let result = harness.run_cli(&[
        "list",
        "--manifest",
        path(&manifest),
        "--mode",
        "production",
        "--tier",
        "extension",
        "--json",
    ]);
    result.assert_success();
    let listing: serde_json::Value = serde_json::from_str(&result.stdout).unwrap();
    assert_eq!(listing["mode"], "production");
    let extension = listing["tiers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["tier"] == "extension")
        .unwrap();
    let tests: Vec<&str> = extension["tests"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(tests.contains(&"vector_basic"));
    assert!(!tests.contains(&"pgsodium_basic"));
}

#[test]
fn test_diff_exit_codes() {
    let harness = TestHarness::new();
    let expected = harness.write_file("expected.out", "SELECT 1;\n ?column?\n");
    let same = harness.write_file("same.out", "SELECT 1;\r\n ?column?  \r\n\n");
    let different = harness.write_file("different.out", "SELECT 1;\n ?column? \n 2\n");

    let result = harness.run_cli(&["diff", "-e", path(&expected), "-a", path(&same)]);
    result.assert_success();
    assert!(result.stdout.contains("outputs match"));

    let result = harness.run_cli(&["diff", "-e", path(&expected), "-a", path(&different)]);
    result.assert_exit_code(1);
    assert!(result.stdout.contains("--- expected"));
    assert!(result.stdout.contains("+ 2"));

    let missing = harness.path().join("missing.out");
    harness
        .run_cli(&["diff", "-e", path(&expected), "-a", path(&missing)])
        .assert_exit_code(2);
}

// ============================================================================
// report
// ============================================================================

#[test]
fn test_report_merges_and_fails_on_failures() {
    let harness = TestHarness::new();
    let a = harness.write_file(
        "a.jsonl",
        &to_jsonl(&[TestResult::pass("core_types", 10).in_suite("core")]).unwrap(),
    );
    let b = harness.write_file(
        "b.jsonl",
        &to_jsonl(&[TestResult::fail("vector_basic", 20, "output differs from expected")
            .in_suite("extension")])
        .unwrap(),
    );

    let result = harness.run_cli(&["report", path(&a)]);
    result.assert_success();
    assert_eq!(result.stdout.lines().count(), 1);

    let out = harness.path().join("merged.xml");
    let result = harness.run_cli(&["report", path(&a), path(&b), "--format", "junit", "-o", path(&out)]);
    result.assert_exit_code(1);
    assert!(result.stdout.contains("FAILED"));
    let xml = std::fs::read_to_string(&out).unwrap();
    assert!(xml.contains("tests=\"2\" failures=\"1\""));
}

#[test]
fn test_report_unreadable_input_exits_two() {
    let harness = TestHarness::new();
    let bad = harness.write_file("bad.jsonl", "not json\n");
    harness.run_cli(&["report", path(&bad)]).assert_exit_code(2);
}
