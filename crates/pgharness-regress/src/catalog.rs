//! Named regression tests and their selection.
//!
//! A catalog lists every test the harness knows about with its tier, setup
//! level, eligible modes, and required extensions. Selection keeps the tests
//! whose mode list contains the run mode and whose required extensions are
//! all in the mode's testable set.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use pgharness_model::{HarnessError, Manifest, TestMode};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Invalid JSON.
    #[error("invalid catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The file could not be read.
    #[error("failed to read catalog {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two tests share a name.
    #[error("duplicate test name '{0}' in catalog")]
    DuplicateTest(String),

    /// A test uses a name reserved for setup fixtures.
    #[error("test '{0}' uses a name reserved for setup fixtures")]
    ReservedName(String),

    /// A test lists no eligible mode.
    #[error("test '{0}' is not eligible for any mode")]
    NoModes(String),
}

impl HarnessError for CatalogError {
    fn code(&self) -> &'static str {
        match self {
            CatalogError::Parse(_) => "CATALOG_001",
            CatalogError::Read { .. } => "CATALOG_002",
            CatalogError::DuplicateTest(_) => "CATALOG_003",
            CatalogError::ReservedName(_) => "CATALOG_004",
            CatalogError::NoModes(_) => "CATALOG_005",
        }
    }

    fn category(&self) -> &'static str {
        "validation"
    }
}

/// A named group of tests. Tiers run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Core,
    Extension,
    Interaction,
}

impl Tier {
    /// Every tier, in run order.
    pub const ALL: [Tier; 3] = [Tier::Core, Tier::Extension, Tier::Interaction];

    /// Returns the string identifier for this tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Core => "core",
            Tier::Extension => "extension",
            Tier::Interaction => "interaction",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "core" => Ok(Tier::Core),
            "extension" | "extensions" => Ok(Tier::Extension),
            "interaction" | "interactions" => Ok(Tier::Interaction),
            other => Err(format!(
                "unknown tier '{}' (expected core, extension, or interaction)",
                other
            )),
        }
    }
}

/// Shared fixture state a test needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetupLevel {
    /// Self-contained.
    #[default]
    None,
    /// Needs the `setup_minimal` fixture.
    Minimal,
    /// Needs the `setup_full` fixture.
    Full,
}

impl SetupLevel {
    /// Every level, in run order.
    pub const ALL: [SetupLevel; 3] = [SetupLevel::None, SetupLevel::Minimal, SetupLevel::Full];

    /// Name of the fixture that establishes this level, if any.
    pub fn fixture_name(&self) -> Option<&'static str> {
        match self {
            SetupLevel::None => None,
            SetupLevel::Minimal => Some("setup_minimal"),
            SetupLevel::Full => Some("setup_full"),
        }
    }

    /// Returns the string identifier for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            SetupLevel::None => "none",
            SetupLevel::Minimal => "minimal",
            SetupLevel::Full => "full",
        }
    }
}

fn all_modes() -> Vec<TestMode> {
    vec![TestMode::Production, TestMode::Regression]
}

/// One named regression test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionTest {
    /// Test name; also the fixture name.
    pub name: String,
    /// Tier the test belongs to.
    pub tier: Tier,
    /// Setup the test depends on.
    #[serde(default)]
    pub setup: SetupLevel,
    /// Modes the test is eligible for.
    #[serde(default = "all_modes")]
    pub modes: Vec<TestMode>,
    /// Manifest extensions the test requires.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
    /// Reason this test is expected to fail, if it is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RegressionTest {
    /// Creates a test eligible for every mode, with no setup.
    pub fn new(name: impl Into<String>, tier: Tier) -> Self {
        Self {
            name: name.into(),
            tier,
            setup: SetupLevel::None,
            modes: all_modes(),
            extensions: Vec::new(),
            expected_failure: None,
            description: None,
        }
    }

    pub fn setup(mut self, setup: SetupLevel) -> Self {
        self.setup = setup;
        self
    }

    /// Restricts the test to one mode.
    pub fn only_in(mut self, mode: TestMode) -> Self {
        self.modes = vec![mode];
        self
    }

    /// Adds a required extension.
    pub fn requires(mut self, extension: impl Into<String>) -> Self {
        self.extensions.push(extension.into());
        self
    }

    /// Tags the test as an expected failure.
    pub fn expect_failure(mut self, reason: impl Into<String>) -> Self {
        self.expected_failure = Some(reason.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Why a catalog test was left out of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The run mode is not in the test's mode list.
    Mode(TestMode),
    /// A required extension is not testable in this mode.
    MissingExtension(String),
    /// The tier was not requested.
    Tier(Tier),
    /// The name filter did not match.
    Filtered,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Mode(mode) => write!(f, "not eligible in {} mode", mode),
            SkipReason::MissingExtension(name) => {
                write!(f, "extension '{}' is not testable in this mode", name)
            }
            SkipReason::Tier(tier) => write!(f, "tier '{}' not selected", tier),
            SkipReason::Filtered => f.write_str("excluded by filter"),
        }
    }
}

/// What to select from a catalog.
#[derive(Debug, Clone, Default)]
pub struct SelectionCriteria {
    /// Run mode.
    pub mode: TestMode,
    /// Tiers to include; empty means every tier.
    pub tiers: Vec<Tier>,
    /// Test name filter.
    pub filter: Option<Regex>,
}

impl SelectionCriteria {
    pub fn new(mode: TestMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn tiers(mut self, tiers: impl IntoIterator<Item = Tier>) -> Self {
        self.tiers = tiers.into_iter().collect();
        self
    }

    pub fn filter(mut self, filter: Regex) -> Self {
        self.filter = Some(filter);
        self
    }

    fn wants_tier(&self, tier: Tier) -> bool {
        self.tiers.is_empty() || self.tiers.contains(&tier)
    }
}

/// The outcome of selecting from a catalog.
#[derive(Debug, Clone, Default)]
pub struct Selection<'a> {
    /// Selected tests in catalog order.
    pub selected: Vec<&'a RegressionTest>,
    /// Tests left out, with the reason.
    pub skipped: Vec<(&'a RegressionTest, SkipReason)>,
}

impl<'a> Selection<'a> {
    /// Selected tests of one tier, in catalog order.
    pub fn tier(&self, tier: Tier) -> Vec<&'a RegressionTest> {
        self.selected
            .iter()
            .copied()
            .filter(|t| t.tier == tier)
            .collect()
    }
}

/// Every known regression test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Catalog {
    tests: Vec<RegressionTest>,
}

impl Catalog {
    /// Creates a catalog, rejecting duplicate and reserved names.
    pub fn new(tests: Vec<RegressionTest>) -> Result<Self, CatalogError> {
        let mut seen = BTreeSet::new();
        let reserved: Vec<&str> = SetupLevel::ALL
            .iter()
            .filter_map(SetupLevel::fixture_name)
            .collect();
        for test in &tests {
            if reserved.contains(&test.name.as_str()) {
                return Err(CatalogError::ReservedName(test.name.clone()));
            }
            if !seen.insert(test.name.as_str()) {
                return Err(CatalogError::DuplicateTest(test.name.clone()));
            }
            if test.modes.is_empty() {
                return Err(CatalogError::NoModes(test.name.clone()));
            }
        }
        Ok(Self { tests })
    }

    /// Parses a catalog: a bare array of tests or `{ "tests": [...] }`.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let mut document: serde_json::Value = serde_json::from_str(json)?;
        if document.get("tests").is_some() {
            document = document["tests"].take();
        }
        let tests: Vec<RegressionTest> = serde_json::from_value(document)?;
        Self::new(tests)
    }

    /// Loads a catalog file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// The catalog shipped with the harness.
    ///
    /// The pgsodium + vault interaction test is tagged as an expected failure:
    /// it needs a server key provisioned out of band, which a fresh test
    /// container does not have.
    pub fn builtin() -> Self {
        let tests = vec![
            RegressionTest::new("core_types", Tier::Core)
                .describe("Scalar, array, and JSON types round trip through the server"),
            RegressionTest::new("core_plpgsql", Tier::Core)
                .setup(SetupLevel::Minimal)
                .describe("PL/pgSQL functions over the minimal schema"),
            RegressionTest::new("core_indexes", Tier::Core)
                .setup(SetupLevel::Minimal),
            RegressionTest::new("core_stats", Tier::Core)
                .requires("pg_stat_statements"),
            RegressionTest::new("timescaledb_hypertable", Tier::Extension)
                .setup(SetupLevel::Full)
                .requires("timescaledb"),
            RegressionTest::new("timescaledb_continuous_aggregate", Tier::Extension)
                .setup(SetupLevel::Full)
                .requires("timescaledb"),
            RegressionTest::new("postgis_basic", Tier::Extension).requires("postgis"),
            RegressionTest::new("postgis_topology", Tier::Extension)
                .requires("postgis")
                .requires("postgis_topology"),
            RegressionTest::new("vector_basic", Tier::Extension).requires("vector"),
            RegressionTest::new("pgsodium_basic", Tier::Extension)
                .only_in(TestMode::Regression)
                .requires("pgsodium"),
            RegressionTest::new("timescaledb_postgis", Tier::Interaction)
                .setup(SetupLevel::Full)
                .requires("timescaledb")
                .requires("postgis"),
            RegressionTest::new("pgsodium_vault", Tier::Interaction)
                .only_in(TestMode::Regression)
                .requires("pgsodium")
                .requires("supabase_vault")
                .expect_failure("requires a pgsodium server key provisioned out of band"),
        ];
        Self { tests }
    }

    /// Tests in catalog order.
    pub fn tests(&self) -> &[RegressionTest] {
        &self.tests
    }

    pub fn get(&self, name: &str) -> Option<&RegressionTest> {
        self.tests.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Selects the tests to run for `criteria` against `manifest`.
    pub fn select(&self, manifest: &Manifest, criteria: &SelectionCriteria) -> Selection<'_> {
        let testable: BTreeSet<&str> = manifest
            .extensions_for_mode(criteria.mode)
            .into_iter()
            .map(|e| e.name.as_str())
            .collect();

        let mut selection = Selection::default();
        for test in &self.tests {
            let reason = if !criteria.wants_tier(test.tier) {
                Some(SkipReason::Tier(test.tier))
            } else if !test.modes.contains(&criteria.mode) {
                Some(SkipReason::Mode(criteria.mode))
            } else if let Some(missing) = test
                .extensions
                .iter()
                .find(|e| !testable.contains(e.as_str()))
            {
                Some(SkipReason::MissingExtension(missing.clone()))
            } else if criteria
                .filter
                .as_ref()
                .is_some_and(|f| !f.is_match(&test.name))
            {
                Some(SkipReason::Filtered)
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    tracing::debug!(test = %test.name, "skipped: {}", reason);
                    selection.skipped.push((test, reason));
                }
                None => selection.selected.push(test),
            }
        }
        selection
    }
}
