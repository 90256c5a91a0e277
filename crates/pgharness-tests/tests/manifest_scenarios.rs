//! Manifest scenarios: activation order, validation failures, preload sets.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pgharness-tests --test manifest_scenarios
//! ```

use pretty_assertions::assert_eq;

use pgharness_model::{
    validate_manifest, ErrorCode, Manifest, ManifestEntry, PreloadError, TestMode,
};
use pgharness_tests::fixtures::{small_manifest, RegressTree};
use pgharness_tests::harness::TestHarness;

fn names(manifest: &Manifest) -> Vec<String> {
    manifest
        .dependency_order()
        .unwrap()
        .into_iter()
        .map(|e| e.name.clone())
        .collect()
}

// ============================================================================
// Library-level scenarios
// ============================================================================

/// B depends on A: A comes first, B second.
#[test]
fn test_dependency_resolved_before_dependent() {
    let manifest = Manifest::new(vec![
        ManifestEntry::extension("B").depends_on("A"),
        ManifestEntry::extension("A"),
    ]);
    assert!(validate_manifest(&manifest).is_ok());
    assert_eq!(names(&manifest), vec!["A", "B"]);
}

/// Resolving twice gives the same order.
#[test]
fn test_resolution_is_idempotent() {
    let manifest = Manifest::new(small_manifest());
    assert_eq!(names(&manifest), names(&manifest));
    let order = names(&manifest);
    let postgis = order.iter().position(|n| n == "postgis").unwrap();
    let topology = order.iter().position(|n| n == "postgis_topology").unwrap();
    assert!(postgis < topology);
}

/// A disabled entry without a reason fails validation with M003.
#[test]
fn test_disabled_without_reason_fails() {
    let mut entry = ManifestEntry::extension("plv8");
    entry.enabled = Some(false);
    let result = validate_manifest(&Manifest::new(vec![entry]));
    assert!(!result.is_ok());
    assert!(result.has_error(ErrorCode::MissingDisabledReason));
    assert_eq!(result.errors[0].entry.as_deref(), Some("plv8"));
}

/// Two entries named `vector` are rejected.
#[test]
fn test_duplicate_name_rejected() {
    let manifest = Manifest::new(vec![
        ManifestEntry::extension("vector"),
        ManifestEntry::extension("vector").default_enable(),
    ]);
    let result = validate_manifest(&manifest);
    assert!(result.has_error(ErrorCode::DuplicateName));
}

/// A cycle is a validation error, never a partial order.
#[test]
fn test_cycle_rejected() {
    let manifest = Manifest::new(vec![
        ManifestEntry::extension("a").depends_on("b"),
        ManifestEntry::extension("b").depends_on("a"),
    ]);
    assert!(validate_manifest(&manifest).has_error(ErrorCode::CircularDependency));
    assert!(manifest.dependency_order().is_err());
}

/// Production preloads only default-enabled libraries plus what was asked for.
#[test]
fn test_preload_by_mode() {
    let manifest = Manifest::new(small_manifest());
    let none: [&str; 0] = [];
    assert_eq!(
        manifest.preload_libraries_for(TestMode::Production, &none).unwrap(),
        "timescaledb"
    );
    assert_eq!(
        manifest
            .preload_libraries_for(TestMode::Production, &["pg_cron"])
            .unwrap(),
        "timescaledb,pg_cron"
    );
    assert_eq!(
        manifest.preload_libraries_for(TestMode::Regression, &none).unwrap(),
        "timescaledb,pg_cron"
    );
}

/// Tools are never preloaded, even when asked for by name.
#[test]
fn test_tool_never_preloaded() {
    let manifest = Manifest::new(small_manifest());
    let err = manifest
        .preload_libraries_for(TestMode::Production, &["pgbackrest"])
        .unwrap_err();
    assert_eq!(err, PreloadError::Tool("pgbackrest".to_string()));
}

// ============================================================================
// CLI scenarios
// ============================================================================

/// `pgharness order` prints dependencies first.
#[test]
fn test_cli_order() {
    let harness = TestHarness::new();
    let tree = RegressTree::new();
    let manifest = tree.write_manifest(&[
        ManifestEntry::extension("B").depends_on("A"),
        ManifestEntry::extension("A"),
    ]);
    let result = harness.order(&manifest);
    result.assert_success();
    let lines: Vec<&str> = result.stdout.lines().collect();
    assert_eq!(lines, vec!["A", "B"]);
}

/// `pgharness validate` reports M003 and exits 1.
#[test]
fn test_cli_validate_disabled_without_reason() {
    let harness = TestHarness::new();
    let tree = RegressTree::new();
    let manifest = tree.write_manifest_text(
        r#"{"extensions": [{"name": "plv8", "kind": "extension", "enabled": false}]}"#,
    );
    let result = harness.validate_manifest(&manifest);
    result.assert_exit_code(1);
    assert!(result.stdout.contains("M003"));
    assert!(result.stdout.contains("plv8"));
}
