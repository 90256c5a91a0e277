//! Regression flow: fixtures, comparison, tiers, and full scripted runs.
//!
//! The scripted runtime echoes every regression script back as its output,
//! so a fixture passes exactly when its expected file equals its script.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pgharness-tests --test regression_flow
//! ```

use pretty_assertions::assert_eq;

use pgharness_cli::commands::run::{run_with_runtime, RunPlan};
use pgharness_docker::testing::ScriptedRuntime;
use pgharness_docker::{
    CancellationToken, PollPolicy, ProcessOutput, RunIdentity, ServiceStatus, SqlOutput,
};
use pgharness_model::{Manifest, ManifestEntry, TestMode};
use pgharness_regress::{
    compare_output, run_regression_test, Catalog, CompareOptions, FixtureSet, RegressionTest,
    ScriptRunner, SelectionCriteria, SessionConfig, SetupLevel, Tier,
};
use pgharness_tests::fixtures::RegressTree;

/// Returns every script unchanged, as `psql -a` would for statements with no output.
struct Echo;

impl ScriptRunner for Echo {
    fn run_script(&self, sql: &str) -> SqlOutput {
        SqlOutput {
            stdout: sql.to_string(),
            stderr: String::new(),
            exit_code: 0,
            success: true,
        }
    }
}

fn echo_runtime() -> ScriptedRuntime {
    let runtime = ScriptedRuntime::new();
    runtime.on_exec(|request| {
        if request.argv.first().map(String::as_str) == Some("sh") {
            let script = request.stdin.clone().unwrap_or_default();
            ProcessOutput::with_status(0, String::from_utf8_lossy(&script), "")
        } else {
            ProcessOutput::with_status(0, "", "")
        }
    });
    runtime
}

fn plan(tree: &RegressTree, manifest: Vec<ManifestEntry>, tests: Vec<RegressionTest>) -> RunPlan {
    RunPlan {
        manifest: Manifest::new(manifest),
        catalog: Catalog::new(tests).unwrap(),
        fixtures: FixtureSet::discover(tree.path()).unwrap(),
        criteria: SelectionCriteria::new(TestMode::Regression),
        session: SessionConfig {
            readiness: PollPolicy::quick(),
            ..SessionConfig::new("postgres:17", "")
        },
        compare: CompareOptions::default(),
    }
}

// ============================================================================
// Single fixtures
// ============================================================================

/// A fixture whose output matches its expected file passes with no diff.
#[test]
fn test_matching_fixture_passes() {
    let tree = RegressTree::new();
    let sql = "CREATE EXTENSION vector;\nSELECT '[1,2,3]'::vector;\n";
    tree.add_fixture("vector_basic", sql, Some(sql));

    let fixtures = FixtureSet::discover(tree.path()).unwrap();
    let result = run_regression_test(
        fixtures.require("vector_basic").unwrap(),
        &Echo,
        &CompareOptions::default(),
    );
    assert!(result.passed, "{:?}", result.error);
    assert_eq!(result.diff, None);
    assert_eq!(result.error, None);
}

/// Line endings and trailing blanks do not count as differences.
#[test]
fn test_whitespace_normalized_before_compare() {
    let options = CompareOptions::default();
    assert_eq!(
        compare_output("SELECT 1;\r\n ?column? \r\n", "SELECT 1;\n ?column?\n\n", &options),
        None
    );
}

/// A mismatch fails with a unified diff and keeps the actual output.
#[test]
fn test_mismatch_reports_diff() {
    let tree = RegressTree::new();
    tree.add_fixture(
        "core_types",
        "SELECT 1;\nSELECT 2;\n",
        Some("SELECT 1;\nSELECT 3;\n"),
    );
    let results_dir = tree.path().join("results");
    let options = CompareOptions::default().results_dir(&results_dir);

    let fixtures = FixtureSet::discover(tree.path()).unwrap();
    let result = run_regression_test(
        fixtures.require("core_types").unwrap(),
        &Echo,
        &options,
    );
    assert!(!result.passed);
    assert!(result.is_failure());
    let diff = result.diff.unwrap();
    assert!(diff.starts_with("--- expected\n+++ actual\n"), "{}", diff);
    assert!(diff.contains("-SELECT 3;\n+SELECT 2;"), "{}", diff);
    assert!(result.error.unwrap().contains("output differs"));

    let saved = std::fs::read_to_string(results_dir.join("core_types.out")).unwrap();
    assert_eq!(saved, "SELECT 1;\nSELECT 2;\n");
}

/// A missing expected file fails the test without running anything.
#[test]
fn test_missing_expected_fails() {
    let tree = RegressTree::new();
    tree.add_fixture("postgis_basic", "SELECT postgis_version();\n", None);

    let fixtures = FixtureSet::discover(tree.path()).unwrap();
    let result = run_regression_test(
        fixtures.require("postgis_basic").unwrap(),
        &Echo,
        &CompareOptions::default(),
    );
    assert!(!result.passed);
    assert!(result.error.unwrap().contains("missing expected output"));
}

// ============================================================================
// Full runs against the scripted runtime
// ============================================================================

/// Tiers run in order, setup fixtures first, and an expected failure does not
/// fail the run.
#[test]
fn test_scripted_run_with_known_failure() {
    let tree = RegressTree::new();
    tree.add_fixture("core_types", "SELECT 1;\n", Some("SELECT 1;\n"));
    tree.add_fixture("setup_minimal", "CREATE TABLE t (id int);\n", Some("CREATE TABLE t (id int);\n"));
    tree.add_fixture("core_indexes", "CREATE INDEX ON t (id);\n", Some("CREATE INDEX ON t (id);\n"));
    tree.add_fixture("vector_basic", "SELECT '[1]'::vector;\n", Some("SELECT '[1]'::vector;\n"));
    tree.add_fixture(
        "pgsodium_vault",
        "SELECT vault.create_secret('s');\n",
        Some("SELECT vault.create_secret('s');\n ok\n"),
    );

    let manifest = vec![
        ManifestEntry::extension("vector").default_enable(),
        ManifestEntry::extension("pgsodium").shared_preload(false),
        ManifestEntry::extension("supabase_vault").depends_on("pgsodium"),
    ];
    let tests = vec![
        RegressionTest::new("core_types", Tier::Core),
        RegressionTest::new("core_indexes", Tier::Core).setup(SetupLevel::Minimal),
        RegressionTest::new("vector_basic", Tier::Extension).requires("vector"),
        RegressionTest::new("pgsodium_vault", Tier::Interaction)
            .requires("pgsodium")
            .requires("supabase_vault")
            .expect_failure("needs a server key"),
    ];
    let runtime = echo_runtime();

    let outcome = run_with_runtime(
        &plan(&tree, manifest, tests),
        &runtime,
        RunIdentity::from_run_id("flow-1"),
        &CancellationToken::new(),
    );
    assert!(outcome.infra.is_ok(), "{:?}", outcome.infra);

    let order: Vec<(&str, Option<&str>)> = outcome
        .results
        .results()
        .iter()
        .map(|r| (r.name.as_str(), r.suite.as_deref()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("core_types", Some("core")),
            ("setup_minimal", Some("core")),
            ("core_indexes", Some("core")),
            ("vector_basic", Some("extension")),
            ("pgsodium_vault", Some("interaction")),
        ]
    );

    let summary = outcome.results.summary();
    assert_eq!(summary.passed, 4);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.known_failures, 1);
    assert!(!outcome.results.has_failures());

    let vault = &outcome.results.results()[4];
    assert_eq!(vault.known_failure.as_deref(), Some("needs a server key"));
    assert!(vault.diff.is_some());

    // one fresh database per tier
    let creates = runtime
        .exec_requests()
        .iter()
        .filter(|r| r.argv.iter().any(|a| a == "CREATE DATABASE regression"))
        .count();
    assert_eq!(creates, 3);
    assert_eq!(outcome.cleanup.removed, vec!["pgh-regress-flow-1".to_string()]);
}

/// A failing setup fixture fails its dependents without running them.
#[test]
fn test_setup_failure_skips_dependents() {
    let tree = RegressTree::new();
    tree.add_fixture("setup_full", "CREATE EXTENSION timescaledb;\n", Some("ERROR\n"));
    tree.add_fixture("timescaledb_hypertable", "SELECT 1;\n", Some("SELECT 1;\n"));
    tree.add_fixture("core_types", "SELECT 1;\n", Some("SELECT 1;\n"));

    let manifest = vec![ManifestEntry::extension("timescaledb").shared_preload(true)];
    let tests = vec![
        RegressionTest::new("core_types", Tier::Core),
        RegressionTest::new("timescaledb_hypertable", Tier::Extension)
            .setup(SetupLevel::Full)
            .requires("timescaledb"),
    ];
    let runtime = echo_runtime();

    let outcome = run_with_runtime(
        &plan(&tree, manifest, tests),
        &runtime,
        RunIdentity::from_run_id("flow-2"),
        &CancellationToken::new(),
    );
    assert!(outcome.infra.is_ok());

    let results = outcome.results.results();
    assert_eq!(results.len(), 3);
    assert!(results[0].passed);
    assert_eq!(results[1].name, "setup_full");
    assert!(!results[1].passed);
    assert_eq!(results[2].name, "timescaledb_hypertable");
    assert!(results[2]
        .error
        .as_deref()
        .unwrap()
        .contains("setup 'setup_full' failed"));
    assert!(outcome.results.has_failures());

    let scripts_run = runtime
        .exec_requests()
        .iter()
        .filter(|r| r.argv.first().map(String::as_str) == Some("sh"))
        .count();
    assert_eq!(scripts_run, 2);
}

/// A container that dies between tiers aborts the run but keeps earlier results.
#[test]
fn test_container_exit_between_tiers_keeps_results() {
    let tree = RegressTree::new();
    tree.add_fixture("core_types", "SELECT 1;\n", Some("SELECT 1;\n"));
    tree.add_fixture("vector_basic", "SELECT 1;\n", Some("SELECT 1;\n"));

    let manifest = vec![ManifestEntry::extension("vector").default_enable()];
    let tests = vec![
        RegressionTest::new("core_types", Tier::Core),
        RegressionTest::new("vector_basic", Tier::Extension).requires("vector"),
    ];
    let runtime = echo_runtime();
    // readiness, core tier check, then gone before the extension tier
    runtime.script_status(
        "pgh-regress-flow-3",
        vec![
            ServiceStatus::healthy(),
            ServiceStatus::healthy(),
            ServiceStatus::exited(137),
        ],
    );
    runtime.set_logs("pgh-regress-flow-3", "LOG:  server process was terminated by signal 9");

    let outcome = run_with_runtime(
        &plan(&tree, manifest, tests),
        &runtime,
        RunIdentity::from_run_id("flow-3"),
        &CancellationToken::new(),
    );
    let err = outcome.infra.unwrap_err();
    assert!(err.to_string().contains("pgh-regress-flow-3"), "{}", err);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results.results()[0].name, "core_types");
    assert_eq!(outcome.cleanup.removed, vec!["pgh-regress-flow-3".to_string()]);
}
