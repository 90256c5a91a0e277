//! Tier orchestration.
//!
//! Tiers run in order (`core`, `extension`, `interaction`), each
//! sequentially against one shared database. A tier with failing tests does
//! not stop later tiers; an infrastructure error while preparing a tier ends
//! the run. Results already collected stay in the caller's
//! [`ResultAccumulator`] either way, so a summary can always be printed.

use std::time::Instant;

use pgharness_docker::{CancellationToken, InfraError, InfraResult};
use pgharness_model::{Manifest, ResultAccumulator, TestResult};

use crate::catalog::{Catalog, RegressionTest, SelectionCriteria, SetupLevel, Tier};
use crate::comparator::{run_group, CompareOptions, ScriptRunner};
use crate::fixtures::FixtureSet;

/// A database the orchestrator can run tiers against.
pub trait TierSession: ScriptRunner {
    /// Readies the database for `tier`.
    ///
    /// An error here is an infrastructure failure and aborts the run.
    fn prepare_tier(&mut self, tier: Tier) -> InfraResult<()>;
}

/// The tests of one tier, grouped by setup level.
#[derive(Debug, Clone)]
pub struct TierPlan<'a> {
    pub tier: Tier,
    /// Non-empty groups in setup-level order; catalog order within a group.
    pub groups: Vec<(SetupLevel, Vec<&'a RegressionTest>)>,
}

impl TierPlan<'_> {
    /// Number of catalog tests in the tier.
    pub fn test_count(&self) -> usize {
        self.groups.iter().map(|(_, tests)| tests.len()).sum()
    }
}

/// Counts for one finished tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierTally {
    pub passed: usize,
    pub failed: usize,
    pub known_failures: usize,
}

impl TierTally {
    fn record(&mut self, result: &TestResult) {
        if result.passed {
            self.passed += 1;
        } else if result.is_known_failure() {
            self.known_failures += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Runs the selected catalog tests tier by tier.
pub struct Orchestrator<'a> {
    catalog: &'a Catalog,
    manifest: &'a Manifest,
    fixtures: &'a FixtureSet,
    criteria: SelectionCriteria,
    options: CompareOptions,
    cancel: CancellationToken,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        catalog: &'a Catalog,
        manifest: &'a Manifest,
        fixtures: &'a FixtureSet,
        criteria: SelectionCriteria,
    ) -> Self {
        Self {
            catalog,
            manifest,
            fixtures,
            criteria,
            options: CompareOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn options(mut self, options: CompareOptions) -> Self {
        self.options = options;
        self
    }

    /// Observes `cancel` between tests and tiers.
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The tiers that have at least one selected test.
    pub fn plan(&self) -> Vec<TierPlan<'a>> {
        let selection = self.catalog.select(self.manifest, &self.criteria);
        Tier::ALL
            .iter()
            .filter_map(|&tier| {
                let tests = selection.tier(tier);
                let groups: Vec<_> = SetupLevel::ALL
                    .iter()
                    .map(|&level| {
                        let members: Vec<&RegressionTest> =
                            tests.iter().copied().filter(|t| t.setup == level).collect();
                        (level, members)
                    })
                    .filter(|(_, members)| !members.is_empty())
                    .collect();
                if groups.is_empty() {
                    None
                } else {
                    Some(TierPlan { tier, groups })
                }
            })
            .collect()
    }

    /// Runs every planned tier, pushing results into `results`.
    ///
    /// Returns `Err` on an infrastructure failure or cancellation; results
    /// gathered before that point remain in `results`.
    pub fn run(
        &self,
        session: &mut dyn TierSession,
        results: &mut ResultAccumulator,
    ) -> InfraResult<()> {
        let plan = self.plan();
        if plan.is_empty() {
            tracing::warn!(mode = %self.criteria.mode, "no catalog tests selected");
            return Ok(());
        }

        for tier_plan in plan {
            if self.cancel.is_cancelled() {
                return Err(InfraError::Cancelled);
            }
            let tier = tier_plan.tier;
            let started = Instant::now();
            tracing::info!(tier = %tier, tests = tier_plan.test_count(), "starting tier");

            session.prepare_tier(tier)?;

            let mut tally = TierTally::default();
            for (setup, tests) in &tier_plan.groups {
                let outcome = run_group(
                    *setup,
                    tests,
                    self.fixtures,
                    &*session,
                    &self.options,
                    &self.cancel,
                );
                for result in outcome.results {
                    let result = self.classify(result).in_suite(tier.as_str());
                    log_result(&result);
                    tally.record(&result);
                    results.push(result);
                }
                if outcome.cancelled {
                    return Err(InfraError::Cancelled);
                }
            }

            tracing::info!(
                tier = %tier,
                passed = tally.passed,
                failed = tally.failed,
                known_failures = tally.known_failures,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "tier finished"
            );
        }
        Ok(())
    }

    /// Applies a test's expected-failure tag to its result.
    fn classify(&self, result: TestResult) -> TestResult {
        let Some(reason) = self
            .catalog
            .get(&result.name)
            .and_then(|t| t.expected_failure.as_deref())
        else {
            return result;
        };
        if result.passed {
            tracing::warn!(
                test = %result.name,
                "passed but is tagged as an expected failure ({}); consider removing the tag",
                reason
            );
            result
        } else {
            result.mark_known_failure(reason)
        }
    }
}

fn log_result(result: &TestResult) {
    if result.passed {
        tracing::info!(test = %result.name, duration_ms = result.duration_ms, "ok");
    } else if let Some(reason) = &result.known_failure {
        tracing::info!(test = %result.name, "known failure: {}", reason);
    } else {
        tracing::warn!(
            test = %result.name,
            "FAILED: {}",
            result.error.as_deref().unwrap_or("no error recorded")
        );
    }
}
