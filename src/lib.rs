//! domcheck - DOM-scoped test execution engine
//!
//! Suites of tests are bound to CSS selectors and run once per matching
//! element of an HTML document, with per-test timeouts, retries, focus and
//! skip/todo markers, lifecycle hooks, plugins and a debounced watch mode.

pub mod cli;
pub mod commands;
pub mod common;
pub mod dom;
pub mod engine;
pub mod testing;

// Re-export commonly used types
pub use common::{Error, Result};
pub use dom::Document;
pub use engine::{
    ensure, test_fn, Outcome, Plugin, Runner, RunnerConfig, RunnerEvent, SuiteOptions,
    SuiteResult, TestContext, TestFailure, TestFuture, TestOptions, TestResult, WatchConfig,
    Watcher,
};
