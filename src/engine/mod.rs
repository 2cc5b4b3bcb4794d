//! DOM-scoped test execution engine
//!
//! Suites are registered against CSS selectors; every test runs once per
//! matching element under a shared timeout/retry policy, and the run produces
//! one [`SuiteResult`] per suite.

mod context;
mod plugin;
mod results;
mod retry;
mod runner;
mod timeout;
mod types;
mod watch;

pub use context::{ensure, test_fn, Intent, TestContext, TestFailure, TestFn, TestFuture};
pub use plugin::{ListenerId, Plugin, RunnerEvent, TracingReporter};
pub use results::{result_id, summarize, Outcome, RunSummary, SuiteResult, TestResult};
pub use retry::{with_retry, Retried};
pub use runner::{CompleteCallback, ErrorCallback, Runner, RunnerConfig, StartCallback};
pub use timeout::{with_timeout, TimeoutError};
pub use types::{
    has_focused, EffectiveConfig, SuiteOptions, SuiteSummary, TestDefinition, TestOptions,
    TestSuite, TestSummary,
};
pub use watch::{WatchConfig, Watcher};

/// Per-test timeout when nothing else is configured
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Retries when nothing else is configured
pub const DEFAULT_RETRY: u32 = 0;

/// Selector used when neither the test nor its suite names one
pub const DEFAULT_SELECTOR: &str = "body";

/// Watch mode debounce window
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
