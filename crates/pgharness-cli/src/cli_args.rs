//! CLI argument definitions for the pgharness command-line interface.
//!
//! All `#[derive(Parser)]` and `#[derive(Subcommand)]` types are defined here,
//! keeping `main.rs` focused on dispatch logic.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use pgharness_model::{ExportFormat, TestMode};
use pgharness_regress::{Tier, DEFAULT_CONTEXT_LINES};

use pgharness_cli::commands::run::RunArgs;

/// pgharness - PostgreSQL extension regression harness
#[derive(Parser)]
#[command(name = "pgharness")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace); PGH_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Validate an extension manifest without starting anything
    Validate {
        /// Path to the manifest (JSON)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Output machine-readable JSON diagnostics (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Print manifest entries in activation order
    Order {
        /// Path to the manifest (JSON)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Output a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Print the shared_preload_libraries value for a mode
    Preload {
        /// Path to the manifest (JSON)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Test mode (production or regression)
        #[arg(long)]
        mode: Option<TestMode>,

        /// Opt-in preload module (repeatable)
        #[arg(long = "with")]
        with: Vec<String>,
    },

    /// List the catalog tests a run would execute
    List {
        /// Path to the manifest (JSON)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Test catalog (JSON); the built-in catalog when omitted
        #[arg(short, long)]
        catalog: Option<PathBuf>,

        /// Test mode (production or regression)
        #[arg(long)]
        mode: Option<TestMode>,

        /// Only these tiers (repeatable)
        #[arg(long = "tier")]
        tiers: Vec<Tier>,

        /// Only tests whose name matches this regex
        #[arg(long)]
        filter: Option<String>,

        /// Output machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare an expected and an actual output file
    Diff {
        /// Expected output
        #[arg(short, long)]
        expected: PathBuf,

        /// Actual output
        #[arg(short, long)]
        actual: PathBuf,

        /// Context lines around each change
        #[arg(long, default_value_t = DEFAULT_CONTEXT_LINES)]
        context: usize,
    },

    /// Start a container and run the selected regression tests
    Run(RunArgs),

    /// Merge result files from earlier runs
    Report {
        /// JSONL result files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format (jsonl or junit)
        #[arg(long, default_value = "jsonl")]
        format: ExportFormat,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check docker and environment settings
    Doctor,

    /// Remove resources left behind by a crashed run
    Cleanup {
        /// Run id printed when the run started
        #[arg(long)]
        run_id: String,
    },
}
