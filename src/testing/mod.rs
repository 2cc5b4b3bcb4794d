//! Declarative suite files
//!
//! YAML files describing suites, tests and built-in element checks. Loading a
//! file registers ordinary suites with a [`crate::Runner`], so everything the
//! engine does (focus, timeouts, retries, bail) applies unchanged.

mod config;
mod runner;

pub use config::*;
pub use runner::{
    collect_suite_paths, evaluate, load_suite_file, load_suites, parse_suite_file, register_suites,
    run_checks,
};
