//! Pure projections over manifest entries.
//!
//! Every function takes any slice of entries and returns borrowed views in
//! input order, so projections compose and never mutate the snapshot.

use super::entry::{EntryKind, ManifestEntry};
use crate::mode::TestMode;

/// Extensions that can be exercised with `CREATE EXTENSION`.
///
/// Excludes disabled entries, tools and builtins, and preload-only modules.
/// A tool loaded into the server crashes it, so the kind check here is kept
/// independent of whatever the caller already filtered.
pub fn testable_extensions(entries: &[ManifestEntry]) -> Vec<&ManifestEntry> {
    entries
        .iter()
        .filter(|e| e.is_enabled() && e.kind == EntryKind::Extension && !e.runtime.preload_only)
        .collect()
}

/// Entries that must be listed in `shared_preload_libraries`.
pub fn preload_extensions(entries: &[ManifestEntry]) -> Vec<&ManifestEntry> {
    entries
        .iter()
        .filter(|e| e.is_enabled() && e.runtime.shared_preload && !e.is_tool())
        .collect()
}

/// Entries enabled in the release image by default.
pub fn default_enabled_extensions(entries: &[ManifestEntry]) -> Vec<&ManifestEntry> {
    entries
        .iter()
        .filter(|e| e.is_enabled() && e.runtime.default_enable)
        .collect()
}

/// Preload modules that callers must opt into explicitly.
pub fn optional_preload_modules(entries: &[ManifestEntry]) -> Vec<&ManifestEntry> {
    entries
        .iter()
        .filter(|e| {
            e.is_enabled() && e.runtime.shared_preload && !e.runtime.default_enable && !e.is_tool()
        })
        .collect()
}

/// Entries tagged with the given category.
pub fn by_category<'a>(entries: &'a [ManifestEntry], category: &str) -> Vec<&'a ManifestEntry> {
    entries.iter().filter(|e| e.category == category).collect()
}

/// Testable extensions in scope for a test mode.
///
/// Production covers only the extensions that ship enabled; regression covers
/// every testable extension.
pub fn extensions_for_mode(entries: &[ManifestEntry], mode: TestMode) -> Vec<&ManifestEntry> {
    testable_extensions(entries)
        .into_iter()
        .filter(|e| match mode {
            TestMode::Production => e.runtime.default_enable,
            TestMode::Regression => true,
        })
        .collect()
}
