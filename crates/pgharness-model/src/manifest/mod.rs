//! Extension manifest model.
//!
//! A manifest describes every extension, tool, and builtin bundled into the
//! image. It is loaded once per run and never mutated afterwards; every view
//! over it is a borrowed projection.

mod entry;
mod filters;
mod preload;
mod resolve;
mod validation;


use std::path::Path;

pub use entry::{EntryKind, ManifestEntry, RuntimeFlags, LIBRARY_NAME_OVERRIDES};
pub use filters::{
    by_category, default_enabled_extensions, extensions_for_mode, optional_preload_modules,
    preload_extensions, testable_extensions,
};
pub use preload::{build_optional_preload_libraries, build_preload_libraries, PreloadError};
pub use resolve::{find_cycles, resolve_dependency_order, ResolveError};
pub use validation::{validate_entries, validate_manifest};

use crate::error::{HarnessError, ManifestError, ValidationWarning};
use crate::mode::TestMode;

/// An immutable snapshot of manifest entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Wraps a list of entries without validating them.
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// Parses a manifest from JSON.
    ///
    /// Accepts either a bare array of entries or `{"extensions": [...]}`.
    /// Parsing does not validate; call [`validate_manifest`] or
    /// [`Manifest::load_validated`].
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        let mut document: serde_json::Value = serde_json::from_str(json)?;
        let list = if document.get("extensions").is_some() {
            document["extensions"].take()
        } else {
            document
        };
        let entries = serde_json::from_value(list)?;
        Ok(Self { entries })
    }

    /// Serializes the manifest as `{"extensions": [...]}`.
    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        let document = serde_json::json!({ "extensions": self.entries });
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Loads and validates a manifest file, returning it with any warnings.
    pub fn load_validated(
        path: impl AsRef<Path>,
    ) -> Result<(Self, Vec<ValidationWarning>), ManifestError> {
        let manifest = load_manifest(path)?;
        let warnings = validate_manifest(&manifest).into_result()?;
        Ok((manifest, warnings))
    }

    /// Returns all entries in file order.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Looks up an entry by name.
    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the manifest has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in dependency order.
    pub fn dependency_order(&self) -> Result<Vec<&ManifestEntry>, ResolveError> {
        resolve_dependency_order(&self.entries)
    }

    /// Testable extensions in scope for a mode.
    pub fn extensions_for_mode(&self, mode: TestMode) -> Vec<&ManifestEntry> {
        extensions_for_mode(&self.entries, mode)
    }

    /// Builds the preload string for a mode plus explicitly requested modules.
    ///
    /// Production starts from the default-enabled preload set, regression from
    /// every preload extension (which already covers any valid optional name).
    /// Each optional name must be an enabled, preloadable, non-tool entry.
    pub fn preload_libraries_for<S: AsRef<str>>(
        &self,
        mode: TestMode,
        optional: &[S],
    ) -> Result<String, PreloadError> {
        for name in optional {
            preload::check_optional_module(&self.entries, name.as_ref())?;
        }
        let libraries = match mode {
            TestMode::Production => build_optional_preload_libraries(&self.entries, optional),
            TestMode::Regression => build_preload_libraries(&self.entries),
        };
        Ok(libraries)
    }
}

/// Reads a manifest file from disk.
pub fn load_manifest(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Manifest::from_json(&json)
}

impl HarnessError for ResolveError {
    fn code(&self) -> &'static str {
        match self {
            ResolveError::CircularDependency { .. } => "RESOLVE_001",
            ResolveError::UnknownDependency { .. } => "RESOLVE_002",
        }
    }

    fn category(&self) -> &'static str {
        "validation"
    }
}

impl HarnessError for PreloadError {
    fn code(&self) -> &'static str {
        match self {
            PreloadError::UnknownModule(_) => "PRELOAD_001",
            PreloadError::Disabled { .. } => "PRELOAD_002",
            PreloadError::Tool(_) => "PRELOAD_003",
            PreloadError::NotPreloadable(_) => "PRELOAD_004",
        }
    }

    fn category(&self) -> &'static str {
        "validation"
    }
}
