//! `shared_preload_libraries` construction.

use std::collections::HashSet;

use super::entry::ManifestEntry;

/// Errors raised when a caller asks for a preload set the manifest cannot provide.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreloadError {
    /// The requested module is not in the manifest.
    #[error("unknown preload module '{0}'")]
    UnknownModule(String),

    /// The requested module is disabled.
    #[error("preload module '{name}' is disabled: {reason}")]
    Disabled { name: String, reason: String },

    /// The requested module is a tool and is never loaded into the server.
    #[error("'{0}' is a tool and cannot be preloaded")]
    Tool(String),

    /// The requested module does not declare sharedPreload.
    #[error("'{0}' is not a shared preload library")]
    NotPreloadable(String),
}

/// Builds the comma-joined `shared_preload_libraries` value.
///
/// Filters again regardless of what the caller passed: disabled entries,
/// entries without `sharedPreload`, and tools are dropped. Library names keep
/// input order and appear once.
pub fn build_preload_libraries<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = &'a ManifestEntry>,
{
    let mut seen = HashSet::new();
    let mut libraries = Vec::new();
    for entry in entries {
        if !entry.is_enabled() || !entry.runtime.shared_preload || entry.is_tool() {
            continue;
        }
        let library = entry.library_name();
        if seen.insert(library) {
            libraries.push(library);
        }
    }
    libraries.join(",")
}

/// Unions the default-enabled preload set with caller-selected optional modules.
///
/// Defaults come first in manifest order, then the optional names in the order
/// given, mapped to their library names. Optional names are filtered like the
/// defaults: unknown names, disabled entries, tools, and entries without
/// `sharedPreload` are dropped with a warning.
pub fn build_optional_preload_libraries<S: AsRef<str>>(
    entries: &[ManifestEntry],
    optional: &[S],
) -> String {
    let defaults = entries.iter().filter(|e| e.runtime.default_enable);
    let default_set = build_preload_libraries(defaults);

    let mut seen = HashSet::new();
    let mut libraries = Vec::new();
    let optional_libraries = optional.iter().filter_map(|name| {
        let name = name.as_ref();
        match check_optional_module(entries, name) {
            Ok(entry) => Some(entry.library_name()),
            Err(err) => {
                tracing::warn!(module = name, "dropping optional preload module: {}", err);
                None
            }
        }
    });
    for library in default_set
        .split(',')
        .filter(|s| !s.is_empty())
        .chain(optional_libraries)
    {
        if seen.insert(library) {
            libraries.push(library);
        }
    }
    libraries.join(",")
}

/// Checks that an optional module may be added to the preload set.
pub(crate) fn check_optional_module<'a>(
    entries: &'a [ManifestEntry],
    name: &str,
) -> Result<&'a ManifestEntry, PreloadError> {
    let entry = entries
        .iter()
        .find(|e| e.name == name)
        .ok_or_else(|| PreloadError::UnknownModule(name.to_string()))?;

    if !entry.is_enabled() {
        return Err(PreloadError::Disabled {
            name: entry.name.clone(),
            reason: entry.disabled_reason.clone().unwrap_or_default(),
        });
    }
    if entry.is_tool() {
        return Err(PreloadError::Tool(entry.name.clone()));
    }
    if !entry.runtime.shared_preload {
        return Err(PreloadError::NotPreloadable(entry.name.clone()));
    }
    Ok(entry)
}
