//! Runs fixtures and compares their output with the expected output.
//!
//! Nothing in this module returns an error: every problem, from an unreadable
//! fixture to a psql that never started, becomes a failed [`TestResult`].

use std::path::{Path, PathBuf};
use std::time::Instant;

use pgharness_docker::{CancellationToken, SqlOutput};
use pgharness_model::TestResult;

use crate::catalog::{RegressionTest, SetupLevel};
use crate::diff::{diff_outputs, DEFAULT_CONTEXT_LINES};
use crate::fixtures::{FixturePair, FixtureSet};

/// Executes regression scripts.
pub trait ScriptRunner {
    /// Runs `sql` in echo mode and returns psql's combined output.
    fn run_script(&self, sql: &str) -> SqlOutput;
}

/// Comparison settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareOptions {
    /// Context lines in diffs.
    pub context_lines: usize,
    /// Where the actual output of failing tests is written, if anywhere.
    pub results_dir: Option<PathBuf>,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            context_lines: DEFAULT_CONTEXT_LINES,
            results_dir: None,
        }
    }
}

impl CompareOptions {
    pub fn context_lines(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    pub fn results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = Some(dir.into());
        self
    }
}

/// Compares actual output with expected output.
///
/// Returns the unified diff, or `None` if they match after normalization.
pub fn compare_output(expected: &str, actual: &str, options: &CompareOptions) -> Option<String> {
    diff_outputs(expected, actual, options.context_lines)
}

/// Runs one fixture and compares its output.
pub fn run_regression_test<R>(pair: &FixturePair, runner: &R, options: &CompareOptions) -> TestResult
where
    R: ScriptRunner + ?Sized,
{
    let start = Instant::now();
    let elapsed = || start.elapsed().as_millis() as u64;
    let name = pair.name.as_str();

    let sql = match pair.read_sql() {
        Ok(sql) => sql,
        Err(e) => return TestResult::fail(name, elapsed(), e.to_string()),
    };
    let expected = match pair.read_expected() {
        Ok(text) => text,
        Err(e) => return TestResult::fail(name, elapsed(), e.to_string()),
    };

    let output = runner.run_script(&sql);
    if output.exit_code < 0 {
        return TestResult::fail(
            name,
            elapsed(),
            format!("could not execute fixture: {}", output.stderr.trim()),
        );
    }

    match compare_output(&expected, &output.stdout, options) {
        None => TestResult::pass(name, elapsed()),
        Some(diff) => {
            if let Some(dir) = &options.results_dir {
                save_actual(dir, name, &output.stdout);
            }
            let mut error = "output differs from expected".to_string();
            if output.exit_code != 0 {
                error = format!("{} (psql exit code {})", error, output.exit_code);
            }
            TestResult::fail(name, elapsed(), error).with_diff(diff)
        }
    }
}

/// Runs a fixture by test name.
pub fn run_named<R>(name: &str, fixtures: &FixtureSet, runner: &R, options: &CompareOptions) -> TestResult
where
    R: ScriptRunner + ?Sized,
{
    match fixtures.require(name) {
        Ok(pair) => run_regression_test(pair, runner, options),
        Err(e) => TestResult::fail(name, 0, e.to_string()),
    }
}

fn save_actual(dir: &Path, name: &str, output: &str) {
    let path = dir.join(format!("{}.out", name));
    let written = path
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|_| std::fs::write(&path, output));
    match written {
        Ok(()) => tracing::debug!(test = name, path = %path.display(), "saved actual output"),
        Err(e) => tracing::warn!(test = name, "failed to save actual output to {}: {}", path.display(), e),
    }
}

/// Results of one setup group.
#[derive(Debug, Clone, Default)]
pub struct GroupOutcome {
    /// Results in run order, the setup fixture first when there is one.
    pub results: Vec<TestResult>,
    /// True if cancellation stopped the group early.
    pub cancelled: bool,
}

/// Runs tests that share a setup level.
///
/// The setup fixture runs once and is compared like any test. If it fails,
/// every test in the group fails without running, naming the setup.
pub fn run_group<R>(
    setup: SetupLevel,
    tests: &[&RegressionTest],
    fixtures: &FixtureSet,
    runner: &R,
    options: &CompareOptions,
    cancel: &CancellationToken,
) -> GroupOutcome
where
    R: ScriptRunner + ?Sized,
{
    let mut outcome = GroupOutcome::default();
    if tests.is_empty() {
        return outcome;
    }

    if let Some(setup_name) = setup.fixture_name() {
        if cancel.is_cancelled() {
            outcome.cancelled = true;
            return outcome;
        }
        let result = run_named(setup_name, fixtures, runner, options);
        let setup_failed = !result.passed;
        outcome.results.push(result);

        if setup_failed {
            tracing::warn!(
                setup = setup_name,
                dependents = tests.len(),
                "setup failed; skipping dependent tests"
            );
            for test in tests {
                outcome.results.push(TestResult::fail(
                    &test.name,
                    0,
                    format!("setup '{}' failed; test not run", setup_name),
                ));
            }
            return outcome;
        }
    }

    for test in tests {
        if cancel.is_cancelled() {
            outcome.cancelled = true;
            break;
        }
        outcome
            .results
            .push(run_named(&test.name, fixtures, runner, options));
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Tier;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;

    /// Answers scripts from a table keyed by the script text.
    #[derive(Default)]
    struct TableRunner {
        replies: HashMap<String, SqlOutput>,
        seen: RefCell<Vec<String>>,
    }

    impl TableRunner {
        fn echo(mut self, sql: &str, stdout: &str) -> Self {
            self.replies.insert(
                sql.to_string(),
                SqlOutput {
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                    exit_code: 0,
                    success: true,
                },
            );
            self
        }
    }

    impl ScriptRunner for TableRunner {
        fn run_script(&self, sql: &str) -> SqlOutput {
            self.seen.borrow_mut().push(sql.to_string());
            self.replies
                .get(sql)
                .cloned()
                .unwrap_or_else(|| SqlOutput::error("no reply scripted"))
        }
    }

    fn fixture(root: &Path, name: &str, sql: &str, expected: &str) {
        fs::create_dir_all(root.join("sql")).unwrap();
        fs::create_dir_all(root.join("expected")).unwrap();
        fs::write(root.join("sql").join(format!("{}.sql", name)), sql).unwrap();
        fs::write(root.join("expected").join(format!("{}.out", name)), expected).unwrap();
    }

    #[test]
    fn test_matching_output_passes_without_diff() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), "types", "SELECT 1;\n", "SELECT 1;\n ?column? \n----------\n        1\n(1 row)\n\n");
        let runner = TableRunner::default().echo(
            "SELECT 1;\n",
            "SELECT 1;\r\n ?column?\r\n----------\r\n        1\r\n(1 row)\r\n",
        );
        let set = FixtureSet::discover(dir.path()).unwrap();
        let result = run_named("types", &set, &runner, &CompareOptions::default());
        assert!(result.passed, "{:?}", result);
        assert_eq!(result.diff, None);
        assert_eq!(result.error, None);
    }

    #[test]
    fn test_differing_line_fails_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let expected = "a\nb\nc\nd\ne\nf\ng\n";
        fixture(dir.path(), "letters", "SELECT letters();\n", expected);
        let runner = TableRunner::default().echo("SELECT letters();\n", "a\nb\nc\nD\ne\nf\ng\n");
        let set = FixtureSet::discover(dir.path()).unwrap();
        let result = run_named("letters", &set, &runner, &CompareOptions::default());
        assert!(!result.passed);
        let diff = result.diff.unwrap();
        assert!(diff.contains("-d\n+D\n"));
        assert!(diff.contains(" c\n"));
        assert!(diff.contains(" e\n"));
        assert!(diff.starts_with("--- expected\n+++ actual\n"));
    }

    #[test]
    fn test_failing_output_saved_to_results_dir() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results");
        fixture(dir.path(), "x", "SELECT 1;\n", "1\n");
        let runner = TableRunner::default().echo("SELECT 1;\n", "2\n");
        let set = FixtureSet::discover(dir.path()).unwrap();
        let options = CompareOptions::default().results_dir(&results);
        let result = run_named("x", &set, &runner, &options);
        assert!(!result.passed);
        assert_eq!(fs::read_to_string(results.join("x.out")).unwrap(), "2\n");
    }

    #[test]
    fn test_missing_pieces_are_failures() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sql")).unwrap();
        fs::write(dir.path().join("sql/no_out.sql"), "SELECT 1;\n").unwrap();
        let set = FixtureSet::discover(dir.path()).unwrap();
        let runner = TableRunner::default();

        let result = run_named("no_out", &set, &runner, &CompareOptions::default());
        assert!(result.error.unwrap().contains("missing expected output"));
        let result = run_named("absent", &set, &runner, &CompareOptions::default());
        assert!(result.error.unwrap().contains("no SQL fixture"));
        assert!(runner.seen.borrow().is_empty());
    }

    #[test]
    fn test_runner_failure_is_failed_result() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), "x", "SELECT 1;\n", "1\n");
        let set = FixtureSet::discover(dir.path()).unwrap();
        let result = run_named("x", &set, &TableRunner::default(), &CompareOptions::default());
        assert!(!result.passed);
        assert!(result.error.unwrap().contains("no reply scripted"));
    }

    #[test]
    fn test_setup_failure_fails_group() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), "setup_minimal", "CREATE TABLE t();\n", "CREATE TABLE t();\n");
        fixture(dir.path(), "a", "SELECT 'a';\n", "a\n");
        fixture(dir.path(), "b", "SELECT 'b';\n", "b\n");
        let set = FixtureSet::discover(dir.path()).unwrap();
        let runner = TableRunner::default()
            .echo("CREATE TABLE t();\n", "ERROR:  permission denied\n")
            .echo("SELECT 'a';\n", "a\n");
        let a = RegressionTest::new("a", Tier::Core).setup(SetupLevel::Minimal);
        let b = RegressionTest::new("b", Tier::Core).setup(SetupLevel::Minimal);

        let outcome = run_group(
            SetupLevel::Minimal,
            &[&a, &b],
            &set,
            &runner,
            &CompareOptions::default(),
            &CancellationToken::new(),
        );
        let names: Vec<_> = outcome.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["setup_minimal", "a", "b"]);
        assert!(outcome.results.iter().all(|r| !r.passed));
        assert!(outcome.results[1]
            .error
            .as_deref()
            .unwrap()
            .contains("setup 'setup_minimal' failed"));
        assert_eq!(runner.seen.borrow().len(), 1);
    }

    #[test]
    fn test_setup_runs_once_per_group() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), "setup_full", "SETUP;\n", "SETUP;\n");
        fixture(dir.path(), "a", "A;\n", "A;\n");
        fixture(dir.path(), "b", "B;\n", "B;\n");
        let set = FixtureSet::discover(dir.path()).unwrap();
        let runner = TableRunner::default()
            .echo("SETUP;\n", "SETUP;\n")
            .echo("A;\n", "A;\n")
            .echo("B;\n", "B;\n");
        let a = RegressionTest::new("a", Tier::Core).setup(SetupLevel::Full);
        let b = RegressionTest::new("b", Tier::Core).setup(SetupLevel::Full);

        let outcome = run_group(
            SetupLevel::Full,
            &[&a, &b],
            &set,
            &runner,
            &CompareOptions::default(),
            &CancellationToken::new(),
        );
        assert!(outcome.results.iter().all(|r| r.passed));
        assert_eq!(*runner.seen.borrow(), vec!["SETUP;\n", "A;\n", "B;\n"]);
    }

    #[test]
    fn test_cancelled_group_stops() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), "a", "A;\n", "A;\n");
        let set = FixtureSet::discover(dir.path()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let a = RegressionTest::new("a", Tier::Core);
        let outcome = run_group(
            SetupLevel::None,
            &[&a],
            &set,
            &TableRunner::default(),
            &CompareOptions::default(),
            &cancel,
        );
        assert!(outcome.cancelled);
        assert!(outcome.results.is_empty());
    }
}
