//! pgharness regression engine
//!
//! Runs `pg_regress`-style fixtures against a PostgreSQL container and
//! compares their echoed output with captured expected output. Tests come
//! from a [`Catalog`], are selected by mode and manifest, and run tier by
//! tier through the [`Orchestrator`].
//!
//! # Modules
//!
//! - [`normalize`]: Line-ending and trailing-whitespace normalization
//! - [`diff`]: Unified diffs of expected vs. actual output
//! - [`fixtures`]: Discovery of `sql/*.sql` and `expected/*.out` pairs
//! - [`comparator`]: Running one fixture or one setup group
//! - [`catalog`]: Named tests, tiers, setup levels, selection
//! - [`orchestrator`]: Sequencing tiers into a result accumulator
//! - [`session`]: The container-backed database the tiers run against

pub mod catalog;
pub mod comparator;
pub mod diff;
pub mod fixtures;
pub mod normalize;
pub mod orchestrator;
pub mod session;

pub use catalog::{
    Catalog, CatalogError, RegressionTest, Selection, SelectionCriteria, SetupLevel, SkipReason,
    Tier,
};
pub use comparator::{
    compare_output, run_group, run_named, run_regression_test, CompareOptions, GroupOutcome,
    ScriptRunner,
};
pub use diff::{diff_outputs, unified_diff, DEFAULT_CONTEXT_LINES};
pub use fixtures::{FixtureError, FixturePair, FixtureSet};
pub use normalize::{normalize, normalize_lines};
pub use orchestrator::{Orchestrator, TierPlan, TierSession, TierTally};
pub use session::{ContainerSession, SessionConfig, REGRESSION_DATABASE};
