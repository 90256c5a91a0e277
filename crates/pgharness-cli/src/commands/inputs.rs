//! Loading of command-line inputs.
//!
//! Anything wrong with a file or value the caller named is a usage error.

use std::path::Path;

use anyhow::Result;
use regex::Regex;

use pgharness_model::{Manifest, TestMode};
use pgharness_regress::{Catalog, FixtureSet};

use crate::exit::UsageResultExt;

/// Loads and validates a manifest, logging its warnings.
pub(crate) fn manifest(path: &Path) -> Result<Manifest> {
    let (manifest, warnings) = Manifest::load_validated(path)
        .usage_context(|| format!("invalid manifest {}", path.display()))?;
    for warning in &warnings {
        tracing::warn!(code = %warning.code, "{}", warning.message);
    }
    Ok(manifest)
}

/// Loads a catalog file, or the built-in catalog when none is named.
pub(crate) fn catalog(path: Option<&Path>) -> Result<Catalog> {
    match path {
        Some(path) => {
            Catalog::load(path).usage_context(|| format!("invalid catalog {}", path.display()))
        }
        None => Ok(Catalog::builtin()),
    }
}

/// Discovers the fixture tree under `root`.
pub(crate) fn fixtures(root: &Path) -> Result<FixtureSet> {
    let fixtures = FixtureSet::discover(root)
        .usage_context(|| format!("invalid fixture tree {}", root.display()))?;
    for orphan in fixtures.orphans() {
        tracing::warn!(fixture = %orphan.display(), "expected output has no matching script");
    }
    Ok(fixtures)
}

/// `--mode`, else `PGH_TEST_MODE`, else the config file's mode, else production.
///
/// `run` passes the configured mode, which `HarnessConfig::apply_env` has
/// already replaced with `PGH_TEST_MODE` when that is set.
pub(crate) fn mode(explicit: Option<TestMode>) -> Result<TestMode> {
    TestMode::detect(explicit).usage_context(|| "cannot determine test mode")
}

/// Compiles a `--filter` pattern.
pub(crate) fn filter(pattern: Option<&str>) -> Result<Option<Regex>> {
    pattern
        .map(|p| Regex::new(p).usage_context(|| format!("invalid filter '{}'", p)))
        .transpose()
}
