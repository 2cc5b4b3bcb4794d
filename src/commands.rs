//! CLI command definitions
//!
//! Defines the clap commands for the domcheck CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run suite files once against an HTML document
    Run {
        /// Suite files or directories of `*.yaml` suite files
        #[arg(required = true)]
        suites: Vec<PathBuf>,

        /// HTML document to test
        #[arg(long)]
        html: PathBuf,

        /// Config file (default: platform config dir)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Default per-test timeout in milliseconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Default number of retries
        #[arg(long)]
        retry: Option<u32>,

        /// Stop at the first failing or timed out test
        #[arg(long, overrides_with = "no_bail")]
        bail: bool,

        /// Run every test even when the config file enables bail
        #[arg(long, overrides_with = "bail")]
        no_bail: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-run suite files whenever they or the document change
    Watch {
        /// Suite files or directories of `*.yaml` suite files
        #[arg(required = true)]
        suites: Vec<PathBuf>,

        /// HTML document to test
        #[arg(long)]
        html: PathBuf,

        /// Config file (default: platform config dir)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Debounce window in milliseconds
        #[arg(long)]
        debounce: Option<u64>,
    },

    /// Print the suites and tests a set of suite files registers
    Inspect {
        /// Suite files or directories of `*.yaml` suite files
        #[arg(required = true)]
        suites: Vec<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
