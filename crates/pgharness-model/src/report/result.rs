//! Per-test result record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Outcome of one named test.
///
/// Serialized as one JSONL record. `duration` is in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Test name.
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Wall time in milliseconds.
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    /// Failure message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unified diff between expected and actual output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    /// Named numeric measurements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BTreeMap<String, f64>>,
    /// Tier or suite the test ran in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite: Option<String>,
    /// Declared reason when a failure was expected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_failure: Option<String>,
}

impl TestResult {
    /// Creates a passing result.
    ///
    /// # Example
    /// ```
    /// use pgharness_model::report::TestResult;
    ///
    /// let result = TestResult::pass("vector_basic", 42).in_suite("extension");
    /// assert!(result.passed);
    /// assert_eq!(result.suite.as_deref(), Some("extension"));
    /// ```
    pub fn pass(name: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            passed: true,
            duration_ms,
            error: None,
            diff: None,
            metrics: None,
            suite: None,
            known_failure: None,
        }
    }

    /// Creates a failing result with an error message.
    pub fn fail(name: impl Into<String>, duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            passed: false,
            error: Some(error.into()),
            ..Self::pass(name, duration_ms)
        }
    }

    /// Attaches a diff.
    pub fn with_diff(mut self, diff: impl Into<String>) -> Self {
        self.diff = Some(diff.into());
        self
    }

    /// Records a metric.
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value);
        self
    }

    /// Sets the suite.
    pub fn in_suite(mut self, suite: impl Into<String>) -> Self {
        self.suite = Some(suite.into());
        self
    }

    /// Marks a failed result as an expected failure.
    ///
    /// Has no effect on a passing result.
    pub fn mark_known_failure(mut self, reason: impl Into<String>) -> Self {
        if !self.passed {
            self.known_failure = Some(reason.into());
        }
        self
    }

    /// Returns true if this result counts against the run.
    pub fn is_failure(&self) -> bool {
        !self.passed && self.known_failure.is_none()
    }

    /// Returns true if this result is a failure that was expected.
    pub fn is_known_failure(&self) -> bool {
        !self.passed && self.known_failure.is_some()
    }
}
