//! Manifest entry types.

use serde::{Deserialize, Serialize};

/// What kind of artifact a manifest entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A PostgreSQL extension activated with `CREATE EXTENSION`.
    Extension,
    /// A standalone binary (pgBackRest, PgBouncer, exporters).
    /// Never loaded into the server process.
    Tool,
    /// Ships with the base distribution.
    Builtin,
}

impl EntryKind {
    /// Returns the string identifier for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Extension => "extension",
            EntryKind::Tool => "tool",
            EntryKind::Builtin => "builtin",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime activation flags for an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeFlags {
    /// Must appear in `shared_preload_libraries` to function.
    #[serde(default)]
    pub shared_preload: bool,
    /// Included in the default preload set (vs. opt-in).
    #[serde(default)]
    pub default_enable: bool,
    /// Has no SQL-level extension object to create.
    #[serde(default)]
    pub preload_only: bool,
    /// Library file name when it differs from the entry name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
}

/// One extension, tool, or builtin in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Unique name; the stable key for every lookup.
    pub name: String,
    /// Absent means enabled. `Some(false)` excludes the entry permanently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Entry kind.
    pub kind: EntryKind,
    /// Free-form grouping tag (e.g. "gis", "search").
    #[serde(default)]
    pub category: String,
    /// Runtime activation flags.
    #[serde(default)]
    pub runtime: RuntimeFlags,
    /// Names of entries that must be activated first, in order.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Why the entry is disabled. Required when `enabled == false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_reason: Option<String>,
    /// Human description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ManifestEntry {
    /// Creates an enabled entry with no dependencies and default runtime flags.
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            enabled: None,
            kind,
            category: String::new(),
            runtime: RuntimeFlags::default(),
            dependencies: Vec::new(),
            disabled_reason: None,
            description: None,
        }
    }

    /// Creates an extension entry.
    pub fn extension(name: impl Into<String>) -> Self {
        Self::new(name, EntryKind::Extension)
    }

    /// Creates a tool entry.
    pub fn tool(name: impl Into<String>) -> Self {
        Self::new(name, EntryKind::Tool)
    }

    /// Sets the category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Adds a dependency.
    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    /// Marks the entry as a shared preload library.
    pub fn shared_preload(mut self, default_enable: bool) -> Self {
        self.runtime.shared_preload = true;
        self.runtime.default_enable = default_enable;
        self
    }

    /// Marks the entry as enabled by default (without preload).
    pub fn default_enable(mut self) -> Self {
        self.runtime.default_enable = true;
        self
    }

    /// Marks the entry as preload-only.
    pub fn preload_only(mut self) -> Self {
        self.runtime.preload_only = true;
        self
    }

    /// Disables the entry with a reason.
    pub fn disabled(mut self, reason: impl Into<String>) -> Self {
        self.enabled = Some(false);
        self.disabled_reason = Some(reason.into());
        self
    }

    /// Returns false only when the manifest explicitly disables the entry.
    pub fn is_enabled(&self) -> bool {
        self.enabled != Some(false)
    }

    /// Returns true if this entry is a tool.
    pub fn is_tool(&self) -> bool {
        self.kind == EntryKind::Tool
    }

    /// Returns the name the server loads this entry's shared library under.
    pub fn library_name(&self) -> &str {
        if let Some(ref explicit) = self.runtime.library_name {
            return explicit;
        }
        LIBRARY_NAME_OVERRIDES
            .iter()
            .find(|(name, _)| *name == self.name)
            .map(|(_, library)| *library)
            .unwrap_or(self.name.as_str())
    }
}

/// Entries whose shared library file name differs from the manifest name.
pub const LIBRARY_NAME_OVERRIDES: &[(&str, &str)] = &[("pg_safeupdate", "safeupdate")];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_defaults_to_true() {
        let json = r#"{"name": "vector", "kind": "extension"}"#;
        let entry: ManifestEntry = serde_json::from_str(json).unwrap();
        assert!(entry.is_enabled());
        assert_eq!(entry.enabled, None);
        assert!(!entry.runtime.shared_preload);
        assert!(entry.dependencies.is_empty());
    }

    #[test]
    fn test_camel_case_fields() {
        let json = r#"{
            "name": "pgsodium",
            "enabled": false,
            "kind": "extension",
            "category": "security",
            "runtime": {"sharedPreload": true, "defaultEnable": false, "preloadOnly": false},
            "disabledReason": "requires key provisioning"
        }"#;
        let entry: ManifestEntry = serde_json::from_str(json).unwrap();
        assert!(!entry.is_enabled());
        assert!(entry.runtime.shared_preload);
        assert_eq!(
            entry.disabled_reason.as_deref(),
            Some("requires key provisioning")
        );
    }

    #[test]
    fn test_library_name_remap() {
        assert_eq!(
            ManifestEntry::extension("pg_safeupdate").library_name(),
            "safeupdate"
        );
        assert_eq!(
            ManifestEntry::extension("pg_cron").library_name(),
            "pg_cron"
        );

        let mut explicit = ManifestEntry::extension("auto_explain_ext");
        explicit.runtime.library_name = Some("auto_explain".to_string());
        assert_eq!(explicit.library_name(), "auto_explain");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(EntryKind::Tool.to_string(), "tool");
        let kind: EntryKind = serde_json::from_str("\"builtin\"").unwrap();
        assert_eq!(kind, EntryKind::Builtin);
    }
}
