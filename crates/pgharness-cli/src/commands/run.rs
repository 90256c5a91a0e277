//! Run command implementation
//!
//! Starts one PostgreSQL container with the mode's preload libraries, runs the
//! selected catalog tests tier by tier, tears down everything the run created,
//! and prints a summary. Teardown and the summary happen on every exit path,
//! including infrastructure failures and signals.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use pgharness_docker::{
    install_signal_handlers, CancellationToken, CleanupReport, ContainerRuntime, DockerCli,
    InfraResult, ResourceLedger, RunIdentity, SystemRunner,
};
use pgharness_model::{report, ExportFormat, HarnessError, Manifest, ResultAccumulator, TestMode};
use pgharness_regress::{
    Catalog, CompareOptions, ContainerSession, FixtureSet, Orchestrator, SelectionCriteria,
    SessionConfig, Tier,
};

use super::{inputs, reporting};
use crate::config::HarnessConfig;
use crate::exit::{UsageResultExt, EXIT_FAILURE};

/// Arguments of `pgharness run`.
#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Path to the extension manifest (JSON)
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Fixture root containing sql/ and expected/
    #[arg(short, long)]
    pub fixtures: PathBuf,

    /// Test catalog (JSON); the built-in catalog when omitted
    #[arg(short, long)]
    pub catalog: Option<PathBuf>,

    /// Test mode (production or regression)
    #[arg(long)]
    pub mode: Option<TestMode>,

    /// Only run these tiers (repeatable)
    #[arg(long = "tier")]
    pub tiers: Vec<Tier>,

    /// Only run tests whose name matches this regex
    #[arg(long)]
    pub filter: Option<String>,

    /// Opt-in preload module for production mode (repeatable)
    #[arg(long = "with")]
    pub with: Vec<String>,

    /// Container image (overrides config and PGH_IMAGE)
    #[arg(long)]
    pub image: Option<String>,

    /// Harness config file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write results to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Result file format (jsonl or junit)
    #[arg(long, default_value = "jsonl")]
    pub format: ExportFormat,

    /// Keep the actual output of failing tests here
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Reuse a run id instead of generating one
    #[arg(long)]
    pub run_id: Option<String>,
}

/// Everything a run needs, resolved before any container starts.
pub struct RunPlan {
    pub manifest: Manifest,
    pub catalog: Catalog,
    pub fixtures: FixtureSet,
    pub criteria: SelectionCriteria,
    pub session: SessionConfig,
    pub compare: CompareOptions,
}

impl RunPlan {
    /// Resolves config, inputs, mode, and preload libraries.
    ///
    /// Every failure here is a usage error.
    pub fn resolve(args: &RunArgs) -> Result<(Self, HarnessConfig)> {
        let mut config = HarnessConfig::load(args.config.as_deref())
            .usage_context(|| "invalid configuration")?;
        config
            .apply_env()
            .usage_context(|| "invalid environment override")?;
        if let Some(image) = &args.image {
            config.image = image.clone();
        }
        if let Some(dir) = &args.results_dir {
            config.results_dir = Some(dir.clone());
        }

        let manifest = inputs::manifest(&args.manifest)?;
        let catalog = inputs::catalog(args.catalog.as_deref())?;
        let fixtures = inputs::fixtures(&args.fixtures)?;
        let mode = inputs::mode(args.mode.or(config.mode))?;

        let mut criteria = SelectionCriteria::new(mode).tiers(args.tiers.iter().copied());
        if let Some(filter) = inputs::filter(args.filter.as_deref())? {
            criteria = criteria.filter(filter);
        }

        let preload = manifest
            .preload_libraries_for(mode, &args.with)
            .usage_context(|| "invalid --with module")?;

        let plan = Self {
            session: config.session_config(preload),
            compare: config.compare_options(),
            manifest,
            catalog,
            fixtures,
            criteria,
        };
        Ok((plan, config))
    }

    /// Starts the session and runs every planned tier.
    ///
    /// Everything the run creates is recorded in `ledger`; the caller tears
    /// it down whatever this returns.
    pub fn execute(
        &self,
        runtime: &dyn ContainerRuntime,
        ledger: &mut ResourceLedger,
        cancel: &CancellationToken,
        results: &mut ResultAccumulator,
    ) -> InfraResult<()> {
        let identity = ledger.identity().clone();
        let mut session =
            ContainerSession::start(runtime, &identity, &self.session, cancel.clone(), ledger)?;
        Orchestrator::new(&self.catalog, &self.manifest, &self.fixtures, self.criteria.clone())
            .options(self.compare.clone())
            .cancel_token(cancel.clone())
            .run(&mut session, results)
    }
}

/// Run the run command
///
/// # Returns
/// Exit code: 0 if every test passed or failed as expected, 1 on test or
/// infrastructure failure, 2 on invalid inputs, 128 + signal when interrupted
pub fn run(args: &RunArgs) -> Result<ExitCode> {
    let (plan, config) = RunPlan::resolve(args)?;

    let cancel = CancellationToken::new();
    install_signal_handlers(cancel.clone()).context("failed to install signal handlers")?;
    let runner = Arc::new(SystemRunner::new(cancel.clone()));
    let docker = DockerCli::locate(config.docker.as_deref(), runner)
        .context("docker is required for `pgharness run`")?;

    let identity = match &args.run_id {
        Some(id) => RunIdentity::from_run_id(id.clone()),
        None => RunIdentity::new(),
    };
    println!(
        "{} run {} ({} mode, image {})",
        "Starting:".cyan().bold(),
        identity.run_id(),
        plan.criteria.mode,
        plan.session.image
    );

    let outcome = run_with_runtime(&plan, &docker, identity, &cancel);
    finish(outcome, args, &cancel)
}

/// What a run left behind.
pub struct RunOutcome {
    pub results: ResultAccumulator,
    pub infra: InfraResult<()>,
    pub cleanup: CleanupReport,
    pub elapsed_ms: u64,
}

/// Executes `plan` on `runtime`, then tears the run down.
pub fn run_with_runtime(
    plan: &RunPlan,
    runtime: &dyn ContainerRuntime,
    identity: RunIdentity,
    cancel: &CancellationToken,
) -> RunOutcome {
    let started = Instant::now();
    let mut ledger = ResourceLedger::new(identity);
    let mut results = ResultAccumulator::new();

    let infra = plan.execute(runtime, &mut ledger, cancel, &mut results);
    if let Err(e) = &infra {
        tracing::error!(code = e.code(), "run aborted: {}", e);
    }
    let cleanup = ledger.teardown(runtime);

    RunOutcome {
        results,
        infra,
        cleanup,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

/// Prints the summary, writes the export, and picks the exit code.
fn finish(outcome: RunOutcome, args: &RunArgs, cancel: &CancellationToken) -> Result<ExitCode> {
    let RunOutcome {
        results,
        infra,
        cleanup,
        elapsed_ms,
    } = outcome;

    println!();
    for line in reporting::result_lines(results.results()) {
        println!("{}", line);
    }
    for line in reporting::failure_details(results.results()) {
        println!("{}", line);
    }
    if let Err(e) = &infra {
        println!("\n{} {}", "Infrastructure failure:".red().bold(), e);
    }
    for (name, error) in &cleanup.errors {
        println!("  {} could not remove {}: {}", "!!".yellow(), name, error);
    }
    println!();
    for line in reporting::summary_lines(&results.summary()) {
        println!("{}", line);
    }
    println!("{}", format!("total wall time {}ms", elapsed_ms).dimmed());

    if let Some(path) = &args.output {
        report::write_export(path, results.results(), args.format)
            .with_context(|| format!("failed to write results to {}", path.display()))?;
        println!("{} {}", "Results:".dimmed(), path.display());
    }

    Ok(ExitCode::from(run_exit_code(&infra, &results, cancel)))
}

/// 128 + signal when interrupted, 1 on any failure, else 0.
fn run_exit_code(
    infra: &InfraResult<()>,
    results: &ResultAccumulator,
    cancel: &CancellationToken,
) -> u8 {
    if let Some(code) = cancel.exit_code() {
        return code as u8;
    }
    if infra.is_err() || results.has_failures() {
        return EXIT_FAILURE;
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgharness_docker::testing::ScriptedRuntime;
    use pgharness_docker::{PollPolicy, ProcessOutput, ServiceStatus};
    use pgharness_model::ManifestEntry;
    use pgharness_regress::RegressionTest;
    use std::fs;
    use std::path::Path;

    fn fixture_tree(root: &Path) {
        fs::create_dir_all(root.join("sql")).unwrap();
        fs::create_dir_all(root.join("expected")).unwrap();
        fs::write(root.join("sql/smoke.sql"), "SELECT 1;\n").unwrap();
        fs::write(root.join("expected/smoke.out"), "SELECT 1;\n 1\n").unwrap();
    }

    fn plan(root: &Path) -> RunPlan {
        RunPlan {
            manifest: Manifest::new(vec![ManifestEntry::extension("vector").default_enable()]),
            catalog: Catalog::new(vec![RegressionTest::new("smoke", Tier::Core)]).unwrap(),
            fixtures: FixtureSet::discover(root).unwrap(),
            criteria: SelectionCriteria::new(TestMode::Production),
            session: SessionConfig {
                readiness: PollPolicy::quick(),
                ..SessionConfig::new("pgh/postgres:17", "")
            },
            compare: CompareOptions::default(),
        }
    }

    #[test]
    fn test_passing_run_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        fixture_tree(dir.path());
        let runtime = ScriptedRuntime::new();
        // DROP DATABASE, CREATE DATABASE, then the fixture itself
        runtime.push_exec(ProcessOutput::with_status(0, "", ""));
        runtime.push_exec(ProcessOutput::with_status(0, "", ""));
        runtime.push_exec(ProcessOutput::with_status(0, "SELECT 1;\n 1\n", ""));

        let outcome = run_with_runtime(
            &plan(dir.path()),
            &runtime,
            RunIdentity::from_run_id("t-1"),
            &CancellationToken::new(),
        );
        assert!(outcome.infra.is_ok());
        assert_eq!(outcome.results.len(), 1);
        assert!(!outcome.results.has_failures());
        assert_eq!(outcome.cleanup.removed, vec!["pgh-regress-t-1".to_string()]);
    }

    #[test]
    fn test_readiness_timeout_still_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        fixture_tree(dir.path());
        let runtime = ScriptedRuntime::new();
        runtime.script_status("pgh-regress-t-2", vec![ServiceStatus::starting()]);

        let outcome = run_with_runtime(
            &plan(dir.path()),
            &runtime,
            RunIdentity::from_run_id("t-2"),
            &CancellationToken::new(),
        );
        let err = outcome.infra.unwrap_err();
        assert!(err.to_string().contains("timeout"));
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.cleanup.removed, vec!["pgh-regress-t-2".to_string()]);
    }

    #[test]
    fn test_signal_during_readiness_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        fixture_tree(dir.path());
        let runtime = ScriptedRuntime::new();
        runtime.script_status("pgh-regress-c-1", vec![ServiceStatus::starting()]);
        let cancel = CancellationToken::new();
        let signal = cancel.clone();
        runtime.on_inspect(move |_, inspections| {
            if inspections == 2 {
                signal.cancel_with_signal(pgharness_docker::SIGINT);
            }
        });

        let outcome = run_with_runtime(
            &plan(dir.path()),
            &runtime,
            RunIdentity::from_run_id("c-1"),
            &cancel,
        );
        assert!(outcome.infra.as_ref().unwrap_err().is_cancelled());
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.cleanup.removed, vec!["pgh-regress-c-1".to_string()]);
        assert_eq!(run_exit_code(&outcome.infra, &outcome.results, &cancel), 130);
    }

    #[test]
    fn test_signal_mid_tier_keeps_results_and_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        fixture_tree(dir.path());
        fs::write(dir.path().join("sql/smoke_two.sql"), "SELECT 2;\n").unwrap();
        fs::write(dir.path().join("expected/smoke_two.out"), "SELECT 2;\n 2\n").unwrap();
        let mut plan = plan(dir.path());
        plan.catalog = Catalog::new(vec![
            RegressionTest::new("smoke", Tier::Core),
            RegressionTest::new("smoke_two", Tier::Core),
        ])
        .unwrap();
        plan.fixtures = FixtureSet::discover(dir.path()).unwrap();

        // SIGTERM arrives while the first fixture runs
        let cancel = CancellationToken::new();
        let runtime = ScriptedRuntime::new();
        let signal = cancel.clone();
        runtime.on_exec(move |request| {
            if request.argv.first().map(String::as_str) == Some("sh") {
                signal.cancel_with_signal(pgharness_docker::SIGTERM);
                ProcessOutput::with_status(0, "SELECT 1;\n 1\n", "")
            } else {
                ProcessOutput::with_status(0, "", "")
            }
        });

        let outcome = run_with_runtime(&plan, &runtime, RunIdentity::from_run_id("c-2"), &cancel);
        assert!(outcome.infra.as_ref().unwrap_err().is_cancelled());
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results.results()[0].name, "smoke");
        assert!(outcome.results.results()[0].passed);
        assert_eq!(outcome.cleanup.removed, vec!["pgh-regress-c-2".to_string()]);
        assert_eq!(run_exit_code(&outcome.infra, &outcome.results, &cancel), 143);
    }

    #[test]
    fn test_exit_code_selection() {
        let none = CancellationToken::new();
        let mut results = ResultAccumulator::new();
        assert_eq!(run_exit_code(&Ok(()), &results, &none), 0);
        assert_eq!(
            run_exit_code(&Err(pgharness_docker::InfraError::DockerNotFound), &results, &none),
            EXIT_FAILURE
        );
        results.push(pgharness_model::TestResult::fail("smoke", 1, "output differs from expected"));
        assert_eq!(run_exit_code(&Ok(()), &results, &none), EXIT_FAILURE);
    }
}
