//! Run-level aggregation.

use serde::{Deserialize, Serialize};

use super::TestResult;

/// Suite name used for results that carry none.
pub const DEFAULT_SUITE: &str = "default";

/// Counts for one suite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSummary {
    /// Suite name.
    pub name: String,
    /// Number of results.
    pub total: usize,
    /// Passing results.
    pub passed: usize,
    /// Failing results that count against the run.
    pub failed: usize,
    /// Failures that were declared as expected.
    pub known_failures: usize,
    /// Sum of result durations in milliseconds.
    pub duration_ms: u64,
}

impl SuiteSummary {
    fn record(&mut self, result: &TestResult) {
        self.total += 1;
        self.duration_ms += result.duration_ms;
        if result.passed {
            self.passed += 1;
        } else if result.is_known_failure() {
            self.known_failures += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of results.
    pub total: usize,
    /// Passing results.
    pub passed: usize,
    /// Failing results that count against the run.
    pub failed: usize,
    /// Failures that were declared as expected.
    pub known_failures: usize,
    /// Sum of result durations in milliseconds.
    pub duration_ms: u64,
    /// Per-suite counts, in first-seen order.
    pub by_suite: Vec<SuiteSummary>,
}

impl RunSummary {
    /// Returns true when nothing counts against the run.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Looks up a suite by name.
    pub fn suite(&self, name: &str) -> Option<&SuiteSummary> {
        self.by_suite.iter().find(|s| s.name == name)
    }
}

/// Aggregates results into run totals.
pub fn aggregate(results: &[TestResult]) -> RunSummary {
    let mut summary = RunSummary::default();
    for result in results {
        summary.total += 1;
        summary.duration_ms += result.duration_ms;
        if result.passed {
            summary.passed += 1;
        } else if result.is_known_failure() {
            summary.known_failures += 1;
        } else {
            summary.failed += 1;
        }

        let suite_name = result.suite.as_deref().unwrap_or(DEFAULT_SUITE);
        let idx = match summary.by_suite.iter().position(|s| s.name == suite_name) {
            Some(idx) => idx,
            None => {
                summary.by_suite.push(SuiteSummary {
                    name: suite_name.to_string(),
                    ..Default::default()
                });
                summary.by_suite.len() - 1
            }
        };
        summary.by_suite[idx].record(result);
    }
    summary
}

/// Collects results in execution order.
///
/// Passed explicitly through the orchestrator; there is no shared counter.
#[derive(Debug, Clone, Default)]
pub struct ResultAccumulator {
    results: Vec<TestResult>,
}

impl ResultAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one result.
    pub fn push(&mut self, result: TestResult) {
        self.results.push(result);
    }

    /// Records several results.
    pub fn extend(&mut self, results: impl IntoIterator<Item = TestResult>) {
        self.results.extend(results);
    }

    /// Results recorded so far.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Number of results recorded so far.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Returns true if any recorded result counts against the run.
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(TestResult::is_failure)
    }

    /// Aggregates the results recorded so far.
    pub fn summary(&self) -> RunSummary {
        aggregate(&self.results)
    }

    /// Consumes the accumulator.
    pub fn into_results(self) -> Vec<TestResult> {
        self.results
    }
}
