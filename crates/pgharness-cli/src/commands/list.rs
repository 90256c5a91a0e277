//! List command implementation
//!
//! Shows which catalog tests a run would execute, tier by tier, and why the
//! rest would be skipped.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use pgharness_model::TestMode;
use pgharness_regress::{Catalog, Selection, SelectionCriteria, Tier};

use super::inputs;

/// Run the list command
pub fn run(
    manifest_path: &Path,
    catalog_path: Option<&Path>,
    mode: Option<TestMode>,
    tiers: &[Tier],
    filter: Option<&str>,
    json_output: bool,
) -> Result<ExitCode> {
    let manifest = inputs::manifest(manifest_path)?;
    let catalog = inputs::catalog(catalog_path)?;
    let mode = inputs::mode(mode)?;
    let mut criteria = SelectionCriteria::new(mode).tiers(tiers.iter().copied());
    if let Some(filter) = inputs::filter(filter)? {
        criteria = criteria.filter(filter);
    }

    let selection = catalog.select(&manifest, &criteria);
    if json_output {
        println!("{}", serde_json::to_string_pretty(&to_json(mode, &selection))?);
    } else {
        print_human(mode, &catalog, &selection);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_human(mode: TestMode, catalog: &Catalog, selection: &Selection<'_>) {
    println!(
        "{} {} of {} tests in {} mode",
        "Selected:".cyan().bold(),
        selection.selected.len(),
        catalog.len(),
        mode
    );

    for tier in Tier::ALL {
        let tests = selection.tier(tier);
        if tests.is_empty() {
            continue;
        }
        println!("\n{}", format!("{}:", tier).bold());
        for test in tests {
            let mut line = format!("  {} {}", "->".green(), test.name);
            if let Some(setup) = test.setup.fixture_name() {
                line.push_str(&format!(" {}", format!("(after {})", setup).dimmed()));
            }
            if let Some(reason) = &test.expected_failure {
                line.push_str(&format!(" {}", format!("[expected failure: {}]", reason).yellow()));
            }
            println!("{}", line);
        }
    }

    if !selection.skipped.is_empty() {
        println!("\n{}", "Skipped:".bold());
        for (test, reason) in &selection.skipped {
            println!("  {} {} {}", "--".dimmed(), test.name, format!("({})", reason).dimmed());
        }
    }
}

fn to_json(mode: TestMode, selection: &Selection<'_>) -> serde_json::Value {
    let tiers: Vec<_> = Tier::ALL
        .iter()
        .map(|&tier| {
            let tests: Vec<_> = selection
                .tier(tier)
                .into_iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "setup": t.setup.as_str(),
                        "expectedFailure": t.expected_failure,
                    })
                })
                .collect();
            json!({ "tier": tier.as_str(), "tests": tests })
        })
        .collect();
    let skipped: Vec<_> = selection
        .skipped
        .iter()
        .map(|(t, reason)| json!({ "name": t.name, "reason": reason.to_string() }))
        .collect();
    json!({ "mode": mode.as_str(), "tiers": tiers, "skipped": skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgharness_model::{Manifest, ManifestEntry};
    use pgharness_regress::RegressionTest;

    #[test]
    fn test_json_lists_selected_and_skipped() {
        let manifest = Manifest::new(vec![ManifestEntry::extension("vector").default_enable()]);
        let catalog = Catalog::new(vec![
            RegressionTest::new("extensions_load", Tier::Core),
            RegressionTest::new("vector_basic", Tier::Extension).requires("vector"),
            RegressionTest::new("postgis_basic", Tier::Extension).requires("postgis"),
        ])
        .unwrap();
        let selection = catalog.select(&manifest, &SelectionCriteria::new(TestMode::Production));
        let value = to_json(TestMode::Production, &selection);

        assert_eq!(value["mode"], "production");
        assert_eq!(value["tiers"][0]["tests"][0]["name"], "extensions_load");
        assert_eq!(value["tiers"][1]["tests"][0]["name"], "vector_basic");
        assert_eq!(value["skipped"][0]["name"], "postgis_basic");
        assert!(value["skipped"][0]["reason"]
            .as_str()
            .unwrap()
            .contains("postgis"));
    }
}
