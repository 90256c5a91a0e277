//! Test fixture utilities for creating synthetic regression trees.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use pgharness_model::ManifestEntry;
use pgharness_regress::RegressionTest;

/// The sample tree checked into the repository under `regress/`.
pub fn sample_tree() -> PathBuf {
    crate::harness::workspace_root().join("regress")
}

/// A throwaway regression tree: manifest, catalog, and fixtures.
pub struct RegressTree {
    pub root: TempDir,
}

impl RegressTree {
    /// Creates an empty tree with `sql/` and `expected/` directories.
    pub fn new() -> Self {
        let root = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(root.path().join("sql")).expect("Failed to create sql/");
        fs::create_dir_all(root.path().join("expected")).expect("Failed to create expected/");
        Self { root }
    }

    /// Get the tree root path.
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Path of the manifest file.
    pub fn manifest_path(&self) -> PathBuf {
        self.path().join("manifest.json")
    }

    /// Path of the catalog file.
    pub fn catalog_path(&self) -> PathBuf {
        self.path().join("catalog.json")
    }

    /// Writes the manifest as `{"extensions": [...]}`.
    pub fn write_manifest(&self, entries: &[ManifestEntry]) -> PathBuf {
        let json = serde_json::json!({ "extensions": entries });
        self.write_json(&self.manifest_path(), &json)
    }

    /// Writes raw manifest text, for malformed-input tests.
    pub fn write_manifest_text(&self, text: &str) -> PathBuf {
        let path = self.manifest_path();
        fs::write(&path, text).expect("Failed to write manifest");
        path
    }

    /// Writes the catalog as `{"tests": [...]}`.
    pub fn write_catalog(&self, tests: &[RegressionTest]) -> PathBuf {
        let json = serde_json::json!({ "tests": tests });
        self.write_json(&self.catalog_path(), &json)
    }

    /// Adds a fixture script and, when given, its expected output.
    pub fn add_fixture(&self, name: &str, sql: &str, expected: Option<&str>) {
        fs::write(self.path().join("sql").join(format!("{}.sql", name)), sql)
            .expect("Failed to write fixture script");
        if let Some(expected) = expected {
            fs::write(
                self.path().join("expected").join(format!("{}.out", name)),
                expected,
            )
            .expect("Failed to write expected output");
        }
    }

    fn write_json(&self, path: &Path, value: &serde_json::Value) -> PathBuf {
        let text = serde_json::to_string_pretty(value).expect("fixture JSON serializes");
        fs::write(path, text).expect("Failed to write JSON fixture");
        path.to_path_buf()
    }
}

impl Default for RegressTree {
    fn default() -> Self {
        Self::new()
    }
}

/// A small manifest covering every entry kind and activation flag.
pub fn small_manifest() -> Vec<ManifestEntry> {
    vec![
        ManifestEntry::extension("timescaledb").shared_preload(true),
        ManifestEntry::extension("postgis").default_enable(),
        ManifestEntry::extension("postgis_topology")
            .default_enable()
            .depends_on("postgis"),
        ManifestEntry::extension("vector").default_enable(),
        ManifestEntry::extension("pg_cron").shared_preload(false),
        ManifestEntry::extension("plv8").disabled("no build for this toolchain"),
        ManifestEntry::tool("pgbackrest"),
    ]
}
