//! pgharness model library
//!
//! Pure data and logic shared by every pgharness crate: the extension
//! manifest, dependency ordering, `shared_preload_libraries` construction,
//! test modes, and test result reports. Nothing here touches a container or
//! spawns a process.
//!
//! # Example
//!
//! ```
//! use pgharness_model::manifest::{validate_manifest, Manifest};
//! use pgharness_model::TestMode;
//!
//! let manifest = Manifest::from_json(r#"[
//!     {"name": "timescaledb", "kind": "extension",
//!      "runtime": {"sharedPreload": true, "defaultEnable": true}},
//!     {"name": "postgis", "kind": "extension", "runtime": {"defaultEnable": true}},
//!     {"name": "postgis_topology", "kind": "extension",
//!      "runtime": {"defaultEnable": true}, "dependencies": ["postgis"]}
//! ]"#).unwrap();
//!
//! assert!(validate_manifest(&manifest).is_ok());
//!
//! let none: [&str; 0] = [];
//! let preload = manifest.preload_libraries_for(TestMode::Production, &none).unwrap();
//! assert_eq!(preload, "timescaledb");
//! ```
//!
//! # Modules
//!
//! - [`error`]: Validation error codes and the [`HarnessError`] trait
//! - [`manifest`]: Manifest entries, projections, ordering, preload strings
//! - [`mode`]: Production vs. regression test mode
//! - [`report`]: Test results, summaries, JSONL and JUnit export

pub mod error;
pub mod manifest;
pub mod mode;
pub mod report;

pub use error::{
    ErrorCode, HarnessError, ManifestError, ValidationError, ValidationResult, ValidationWarning,
    WarningCode,
};
pub use manifest::{
    load_manifest, resolve_dependency_order, validate_manifest, EntryKind, Manifest,
    ManifestEntry, PreloadError, ResolveError,
};
pub use mode::{TestMode, UnknownModeError, TEST_MODE_ENV};
pub use report::{aggregate, ExportFormat, ResultAccumulator, RunSummary, TestResult};
