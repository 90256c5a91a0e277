//! Order command implementation
//!
//! Prints the manifest in activation order, dependencies first.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};

use pgharness_model::Manifest;

use super::inputs;

/// Run the order command
pub fn run(manifest_path: &Path, json_output: bool) -> Result<ExitCode> {
    let manifest = inputs::manifest(manifest_path)?;
    let names = activation_order(&manifest)?;
    if json_output {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        for name in &names {
            println!("{}", name);
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Entry names with every dependency ahead of its dependents.
pub fn activation_order(manifest: &Manifest) -> Result<Vec<String>> {
    let order = manifest
        .dependency_order()
        .context("failed to resolve activation order")?;
    Ok(order.into_iter().map(|entry| entry.name.clone()).collect())
}
