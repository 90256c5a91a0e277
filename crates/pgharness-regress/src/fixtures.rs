//! Regression fixture discovery.
//!
//! The tree follows `pg_regress`: `<root>/sql/<name>.sql` holds the input
//! script and `<root>/expected/<name>.out` the captured expected output.
//! Subdirectories are allowed; the test name is the path below `sql/`
//! without the extension, with `/` separators.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use pgharness_model::HarnessError;
use thiserror::Error;
use walkdir::WalkDir;

/// Directory holding input scripts.
pub const SQL_DIR: &str = "sql";
/// Directory holding expected outputs.
pub const EXPECTED_DIR: &str = "expected";

/// Errors from reading the fixture tree.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// The root or its `sql/` directory does not exist.
    #[error("fixture directory not found: {}", .path.display())]
    MissingDirectory { path: PathBuf },

    /// Walking the tree failed.
    #[error("failed to scan fixtures: {0}")]
    Walk(#[from] walkdir::Error),

    /// A named fixture has no input script.
    #[error("no SQL fixture for test '{name}' (looked for {})", .path.display())]
    MissingSql { name: String, path: PathBuf },

    /// A named fixture has no expected output.
    #[error("missing expected output for test '{name}' (looked for {})", .path.display())]
    MissingExpected { name: String, path: PathBuf },

    /// A fixture file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HarnessError for FixtureError {
    fn code(&self) -> &'static str {
        match self {
            FixtureError::MissingDirectory { .. } => "FIXTURE_001",
            FixtureError::Walk(_) => "FIXTURE_002",
            FixtureError::MissingSql { .. } => "FIXTURE_003",
            FixtureError::MissingExpected { .. } => "FIXTURE_004",
            FixtureError::Read { .. } => "FIXTURE_005",
        }
    }

    fn category(&self) -> &'static str {
        "fixture"
    }
}

/// An input script and its expected output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixturePair {
    /// Test name.
    pub name: String,
    /// Path to the `.sql` script.
    pub sql: PathBuf,
    /// Path to the `.out` file (which may not exist).
    pub expected: PathBuf,
}

impl FixturePair {
    /// Returns true if the expected output exists.
    pub fn has_expected(&self) -> bool {
        self.expected.is_file()
    }

    /// Reads the input script.
    pub fn read_sql(&self) -> Result<String, FixtureError> {
        read(&self.sql)
    }

    /// Reads the expected output.
    pub fn read_expected(&self) -> Result<String, FixtureError> {
        if !self.has_expected() {
            return Err(FixtureError::MissingExpected {
                name: self.name.clone(),
                path: self.expected.clone(),
            });
        }
        read(&self.expected)
    }
}

fn read(path: &Path) -> Result<String, FixtureError> {
    std::fs::read_to_string(path).map_err(|source| FixtureError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Every fixture under a root directory, keyed by test name.
#[derive(Debug, Clone, Default)]
pub struct FixtureSet {
    root: PathBuf,
    pairs: BTreeMap<String, FixturePair>,
    orphans: Vec<PathBuf>,
}

impl FixtureSet {
    /// Scans `root` for fixtures.
    ///
    /// A script without an expected output is still listed; running it
    /// produces a missing-fixture failure for that one test. Expected
    /// outputs without a script are collected as orphans.
    pub fn discover(root: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let root = root.as_ref();
        let sql_root = root.join(SQL_DIR);
        if !sql_root.is_dir() {
            return Err(FixtureError::MissingDirectory { path: sql_root });
        }
        let expected_root = root.join(EXPECTED_DIR);

        let mut pairs = BTreeMap::new();
        for entry in WalkDir::new(&sql_root).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().map_or(true, |e| e != "sql") {
                continue;
            }
            let Some(name) = test_name(&sql_root, path) else {
                continue;
            };
            let expected = expected_root.join(format!("{}.out", name));
            pairs.insert(
                name.clone(),
                FixturePair {
                    name,
                    sql: path.to_path_buf(),
                    expected,
                },
            );
        }

        let mut orphans = Vec::new();
        if expected_root.is_dir() {
            for entry in WalkDir::new(&expected_root).min_depth(1).sort_by_file_name() {
                let entry = entry?;
                let path = entry.path();
                if !entry.file_type().is_file() || path.extension().map_or(true, |e| e != "out") {
                    continue;
                }
                if let Some(name) = test_name(&expected_root, path) {
                    if !pairs.contains_key(&name) {
                        orphans.push(path.to_path_buf());
                    }
                }
            }
        }

        tracing::debug!(
            root = %root.display(),
            fixtures = pairs.len(),
            orphans = orphans.len(),
            "discovered fixtures"
        );
        Ok(Self {
            root: root.to_path_buf(),
            pairs,
            orphans,
        })
    }

    /// Fixture root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Looks up a fixture by test name.
    pub fn get(&self, name: &str) -> Option<&FixturePair> {
        self.pairs.get(name)
    }

    /// Looks up a fixture, failing with [`FixtureError::MissingSql`].
    pub fn require(&self, name: &str) -> Result<&FixturePair, FixtureError> {
        self.get(name).ok_or_else(|| FixtureError::MissingSql {
            name: name.to_string(),
            path: self.root.join(SQL_DIR).join(format!("{}.sql", name)),
        })
    }

    /// Test names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pairs.keys().map(String::as_str)
    }

    /// Fixtures in name order.
    pub fn pairs(&self) -> impl Iterator<Item = &FixturePair> {
        self.pairs.values()
    }

    /// Scripts that have no expected output.
    pub fn missing_expected(&self) -> Vec<&FixturePair> {
        self.pairs.values().filter(|p| !p.has_expected()).collect()
    }

    /// Expected outputs that have no script.
    pub fn orphans(&self) -> &[PathBuf] {
        &self.orphans
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn test_name(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?.with_extension("");
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
