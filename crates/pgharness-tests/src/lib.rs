//! pgharness End-to-End Test Infrastructure
//!
//! This crate provides integration tests for the flows that matter most:
//!
//! - Manifest: validation, activation order, preload strings
//! - Lifecycle: readiness polling and teardown against a scripted runtime
//! - Regression: fixture comparison, setup groups, expected failures
//! - CLI: exit codes for success, failure, and invalid invocations
//!
//! ## Running Tests
//!
//! ```bash
//! # Run everything that needs no docker daemon
//! cargo test -p pgharness-tests
//!
//! # Also run the tests that start real containers
//! PGH_RUN_DOCKER_TESTS=1 cargo test -p pgharness-tests -- --ignored
//! ```

pub mod fixtures;
pub mod harness;

pub use fixtures::{sample_tree, RegressTree};
pub use harness::{should_run_docker_tests, CliResult, TestHarness};
