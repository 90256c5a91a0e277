//! Manifest validation.
//!
//! Validation never stops at the first problem: every rule runs over every
//! entry and all violations are collected into one [`ValidationResult`].

use std::collections::{HashMap, HashSet};

use super::entry::ManifestEntry;
use super::resolve::find_cycles;
use super::Manifest;
use crate::error::{
    ErrorCode, ValidationError, ValidationResult, ValidationWarning, WarningCode,
};

/// Validates a loaded manifest.
pub fn validate_manifest(manifest: &Manifest) -> ValidationResult {
    validate_entries(manifest.entries())
}

/// Validates a raw slice of entries.
pub fn validate_entries(entries: &[ManifestEntry]) -> ValidationResult {
    let mut result = ValidationResult::success();

    check_names(entries, &mut result);
    check_disabled_reasons(entries, &mut result);
    check_dependencies(entries, &mut result);
    check_cycles(entries, &mut result);
    check_runtime_flags(entries, &mut result);
    result
}

fn check_names(entries: &[ManifestEntry], result: &mut ValidationResult) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (idx, entry) in entries.iter().enumerate() {
        if entry.name.trim().is_empty() {
            result.add_error(ValidationError::new(
                ErrorCode::EmptyName,
                format!("entry at index {} has an empty name", idx),
            ));
            continue;
        }
        *counts.entry(entry.name.as_str()).or_default() += 1;
    }

    let mut reported = HashSet::new();
    for entry in entries {
        let count = counts.get(entry.name.as_str()).copied().unwrap_or(0);
        if count > 1 && reported.insert(entry.name.as_str()) {
            result.add_error(ValidationError::for_entry(
                ErrorCode::DuplicateName,
                format!("name appears {} times", count),
                &entry.name,
            ));
        }
    }
}

fn check_disabled_reasons(entries: &[ManifestEntry], result: &mut ValidationResult) {
    for entry in entries.iter().filter(|e| !e.is_enabled()) {
        let has_reason = entry
            .disabled_reason
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty());
        if !has_reason {
            result.add_error(ValidationError::for_entry(
                ErrorCode::MissingDisabledReason,
                "disabled entry requires a disabledReason",
                &entry.name,
            ));
        }
    }
}

fn check_dependencies(entries: &[ManifestEntry], result: &mut ValidationResult) {
    let names: HashSet<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    for entry in entries {
        for dependency in &entry.dependencies {
            if !names.contains(dependency.as_str()) {
                result.add_error(ValidationError::for_entry(
                    ErrorCode::DanglingDependency,
                    format!("depends on unknown entry '{}'", dependency),
                    &entry.name,
                ));
            }
        }
    }
}

fn check_cycles(entries: &[ManifestEntry], result: &mut ValidationResult) {
    for cycle in find_cycles(entries) {
        result.add_error(ValidationError::for_entry(
            ErrorCode::CircularDependency,
            format!("circular dependency: {}", cycle.join(" -> ")),
            &cycle[0],
        ));
    }
}

fn check_runtime_flags(entries: &[ManifestEntry], result: &mut ValidationResult) {
    for entry in entries {
        if entry.is_tool() && entry.runtime.shared_preload {
            result.add_warning(ValidationWarning::for_entry(
                WarningCode::ToolDeclaresPreload,
                "tools are never preloaded; sharedPreload is ignored",
                &entry.name,
            ));
        }
        if entry.runtime.preload_only && !entry.runtime.shared_preload {
            result.add_warning(ValidationWarning::for_entry(
                WarningCode::PreloadOnlyWithoutPreload,
                "preloadOnly has no effect without sharedPreload",
                &entry.name,
            ));
        }
    }
}
