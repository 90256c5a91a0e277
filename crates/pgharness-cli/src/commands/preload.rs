//! Preload command implementation
//!
//! Prints the `shared_preload_libraries` value for a mode.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;

use pgharness_model::TestMode;

use super::inputs;
use crate::exit::UsageResultExt;

/// Run the preload command
///
/// `optional` names opt-in preload modules for production mode; each must be
/// an enabled, preloadable extension in the manifest.
pub fn run(manifest_path: &Path, mode: Option<TestMode>, optional: &[String]) -> Result<ExitCode> {
    let manifest = inputs::manifest(manifest_path)?;
    let mode = inputs::mode(mode)?;
    let libraries = manifest
        .preload_libraries_for(mode, optional)
        .usage_context(|| "invalid --with module")?;
    tracing::info!(mode = %mode, "preload libraries resolved");
    println!("{}", libraries);
    Ok(ExitCode::SUCCESS)
}
