//! Execution engine
//!
//! Holds registered suites, resolves per-test configuration and executes each
//! test once per element its selector matches. Everything runs on one task:
//! suites in registration order, tests in registration order, elements in
//! document order.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use scraper::ElementRef;
use tracing::{debug, info, warn};

use super::context::{catch_panic, Intent, TestContext, TestFailure, TestFn, TestFuture};
use super::plugin::{EventBus, ListenerId, Plugin, RunnerEvent};
use super::results::{result_id, Outcome, SuiteResult, TestResult};
use super::retry::{with_retry, Retried};
use super::timeout::with_timeout;
use super::types::{
    has_focused, EffectiveConfig, SuiteOptions, TestDefinition, TestOptions, TestSuite,
};
use super::{DEFAULT_RETRY, DEFAULT_SELECTOR, DEFAULT_TIMEOUT_MS};
use crate::common::{Error, Result};
use crate::dom::{unique_selector, Document, ElementInfo, SelectorGenerator};

/// Called with the number of tests selected for a run
pub type StartCallback = Rc<dyn Fn(usize)>;
/// Called with every suite result once a run finishes
pub type CompleteCallback = Rc<dyn Fn(&[SuiteResult])>;
/// Called for harness-level errors
pub type ErrorCallback = Rc<dyn Fn(&Error)>;

/// Engine-wide defaults and callbacks, fixed at construction
#[derive(Clone)]
pub struct RunnerConfig {
    /// Timeout for tests whose test and suite set none
    pub timeout: Option<Duration>,
    /// Retries for tests whose test and suite set none
    pub retry: Option<u32>,
    /// Pause between retry attempts
    pub retry_delay: Duration,
    /// Stop at the first fail/timeout result
    pub bail: bool,
    pub on_start: Option<StartCallback>,
    pub on_complete: Option<CompleteCallback>,
    pub on_error: Option<ErrorCallback>,
    /// Produces the selector recorded in each result's element snapshot
    pub selector_generator: SelectorGenerator,
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retries: u32) -> Self {
        self.retry = Some(retries);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_bail(mut self, bail: bool) -> Self {
        self.bail = bail;
        self
    }

    pub fn on_start(mut self, callback: impl Fn(usize) + 'static) -> Self {
        self.on_start = Some(Rc::new(callback));
        self
    }

    pub fn on_complete(mut self, callback: impl Fn(&[SuiteResult]) + 'static) -> Self {
        self.on_complete = Some(Rc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&Error) + 'static) -> Self {
        self.on_error = Some(Rc::new(callback));
        self
    }

    pub fn with_selector_generator(
        mut self,
        generator: impl Fn(ElementRef<'_>) -> String + 'static,
    ) -> Self {
        self.selector_generator = Rc::new(generator);
        self
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            retry: None,
            retry_delay: Duration::ZERO,
            bail: false,
            on_start: None,
            on_complete: None,
            on_error: None,
            selector_generator: Rc::new(unique_selector),
        }
    }
}

impl fmt::Debug for RunnerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerConfig")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("retry_delay", &self.retry_delay)
            .field("bail", &self.bail)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct RunnerState {
    suites: Vec<Rc<TestSuite>>,
    /// Only set while a describe body executes
    current: Option<TestSuite>,
    has_focused: bool,
}

struct RunnerInner {
    config: RunnerConfig,
    state: RefCell<RunnerState>,
    document: RefCell<Rc<Document>>,
    events: EventBus,
    plugins: RefCell<Vec<Rc<dyn Plugin>>>,
    running: Cell<bool>,
}

/// A test engine instance
///
/// Cloning is cheap and yields another handle to the same engine. Each
/// independent test campaign should construct its own runner.
#[derive(Clone)]
pub struct Runner {
    inner: Rc<RunnerInner>,
}

/// Moves the current suite into the registry when a describe body ends,
/// including on early return or panic.
struct SuiteGuard<'r> {
    runner: &'r Runner,
}

impl Drop for SuiteGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.runner.inner.state.borrow_mut();
        if let Some(suite) = state.current.take() {
            debug!(suite = %suite.name, tests = suite.tests.len(), "Suite registered");
            state.suites.push(Rc::new(suite));
        }
    }
}

/// Clears the in-flight flag when a run ends
struct RunGuard<'r> {
    running: &'r Cell<bool>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.set(false);
    }
}

/// One element a test is about to run against
struct Target<'d> {
    element: ElementRef<'d>,
    selector: &'d str,
    document: &'d Document,
    index: usize,
}

impl Runner {
    pub fn new(document: Document, config: RunnerConfig) -> Self {
        Self {
            inner: Rc::new(RunnerInner {
                config,
                state: RefCell::new(RunnerState::default()),
                document: RefCell::new(Rc::new(document)),
                events: EventBus::default(),
                plugins: RefCell::new(Vec::new()),
                running: Cell::new(false),
            }),
        }
    }

    /// Runner with default configuration
    pub fn with_document(document: Document) -> Self {
        Self::new(document, RunnerConfig::default())
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.inner.config
    }

    /// The document the next run will query
    pub fn document(&self) -> Rc<Document> {
        Rc::clone(&self.inner.document.borrow())
    }

    /// Replace the document. A run already in flight keeps the one it started with.
    pub fn set_document(&self, document: Document) {
        *self.inner.document.borrow_mut() = Rc::new(document);
    }

    // === Registration ===

    /// Register a suite; `body` registers its tests
    pub fn describe<F>(&self, name: impl Into<String>, body: F) -> Result<()>
    where
        F: FnOnce(&Runner) -> Result<()>,
    {
        self.describe_with(name, SuiteOptions::default(), body)
    }

    /// Register a focused suite
    pub fn describe_only<F>(&self, name: impl Into<String>, body: F) -> Result<()>
    where
        F: FnOnce(&Runner) -> Result<()>,
    {
        self.describe_with(name, SuiteOptions::new().only(), body)
    }

    /// Register a suite with explicit options
    ///
    /// The suite is kept with whatever tests `body` registered, even when
    /// `body` fails.
    pub fn describe_with<F>(
        &self,
        name: impl Into<String>,
        options: SuiteOptions,
        body: F,
    ) -> Result<()>
    where
        F: FnOnce(&Runner) -> Result<()>,
    {
        let name = name.into();
        {
            let mut state = self.inner.state.borrow_mut();
            if let Some(parent) = &state.current {
                return Err(Error::NestedSuite {
                    name,
                    parent: parent.name.clone(),
                });
            }
            state.current = Some(TestSuite::new(name, options));
        }

        let _guard = SuiteGuard { runner: self };
        body(self)
    }

    /// Register a test in the suite being described
    pub fn test<F>(&self, name: impl Into<String>, func: F) -> Result<()>
    where
        F: for<'a> Fn(&'a TestContext<'a>) -> TestFuture<'a> + 'static,
    {
        self.test_with(name, TestOptions::default(), func)
    }

    /// Register a focused test
    pub fn test_only<F>(&self, name: impl Into<String>, func: F) -> Result<()>
    where
        F: for<'a> Fn(&'a TestContext<'a>) -> TestFuture<'a> + 'static,
    {
        self.test_with(name, TestOptions::new().only(), func)
    }

    /// Register a test with explicit options
    pub fn test_with<F>(
        &self,
        name: impl Into<String>,
        options: TestOptions,
        func: F,
    ) -> Result<()>
    where
        F: for<'a> Fn(&'a TestContext<'a>) -> TestFuture<'a> + 'static,
    {
        self.add_test(name.into(), options, Rc::new(func))
    }

    /// Register an already boxed test function
    pub fn add_test(&self, name: String, options: TestOptions, func: TestFn) -> Result<()> {
        let mut state = self.inner.state.borrow_mut();
        let Some(suite) = state.current.as_mut() else {
            return Err(Error::NoActiveSuite {
                call: format!("test('{name}')"),
            });
        };
        suite.tests.push(TestDefinition::new(name, func, options));
        Ok(())
    }

    /// Run `hook` before every (test, element) execution of the current suite.
    /// It shares the test's timeout and retry budget.
    pub fn before_each<F>(&self, hook: F) -> Result<()>
    where
        F: for<'a> Fn(&'a TestContext<'a>) -> TestFuture<'a> + 'static,
    {
        self.with_current("before_each", |suite| {
            suite.before_each = Some(Rc::new(hook));
        })
    }

    /// Run `hook` after every (test, element) execution of the current suite.
    /// A failing hook turns the result into a failure.
    pub fn after_each<F>(&self, hook: F) -> Result<()>
    where
        F: for<'a> Fn(&'a TestContext<'a>) -> TestFuture<'a> + 'static,
    {
        self.with_current("after_each", |suite| {
            suite.after_each = Some(Rc::new(hook));
        })
    }

    fn with_current(&self, call: &str, apply: impl FnOnce(&mut TestSuite)) -> Result<()> {
        let mut state = self.inner.state.borrow_mut();
        match state.current.as_mut() {
            Some(suite) => {
                apply(suite);
                Ok(())
            }
            None => Err(Error::NoActiveSuite {
                call: call.to_string(),
            }),
        }
    }

    /// Drop every registered suite
    pub fn clear(&self) {
        let mut state = self.inner.state.borrow_mut();
        state.suites.clear();
        state.current = None;
        state.has_focused = false;
    }

    /// Snapshot of the registered suites
    pub fn inspect(&self) -> Vec<Rc<TestSuite>> {
        self.inner.state.borrow().suites.clone()
    }

    // === Plugins and events ===

    /// Install a plugin. `install` runs immediately, once.
    pub fn use_plugin<P: Plugin + 'static>(&self, plugin: P) -> Result<()> {
        let plugin: Rc<dyn Plugin> = Rc::new(plugin);
        {
            let mut plugins = self.inner.plugins.borrow_mut();
            if plugins.iter().any(|p| p.name() == plugin.name()) {
                return Err(Error::DuplicatePlugin(plugin.name().to_string()));
            }
            plugins.push(Rc::clone(&plugin));
        }
        debug!(plugin = plugin.name(), "Installing plugin");
        plugin.install(self);
        Ok(())
    }

    /// Uninstall the plugin called `name`. Returns whether it was installed.
    pub fn remove_plugin(&self, name: &str) -> bool {
        let removed = {
            let mut plugins = self.inner.plugins.borrow_mut();
            plugins
                .iter()
                .position(|p| p.name() == name)
                .map(|index| plugins.remove(index))
        };
        match removed {
            Some(plugin) => {
                plugin.uninstall(self);
                true
            }
            None => false,
        }
    }

    /// Names of installed plugins, in installation order
    pub fn plugins(&self) -> Vec<String> {
        self.inner
            .plugins
            .borrow()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    pub fn on_event(&self, listener: impl Fn(&RunnerEvent) + 'static) -> ListenerId {
        self.inner.events.subscribe(Rc::new(listener))
    }

    pub fn off_event(&self, id: ListenerId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    fn emit(&self, event: RunnerEvent) {
        self.inner.events.emit(&event);
    }

    pub(crate) fn report_error(&self, error: &Error) {
        warn!(error = %error, "Runner error");
        if let Some(on_error) = &self.inner.config.on_error {
            on_error(error);
        }
    }

    // === Execution ===

    /// Timeout and retry for `test`: test, then suite, then runner, then defaults
    pub fn effective_config(&self, suite: &TestSuite, test: &TestDefinition) -> EffectiveConfig {
        let config = &self.inner.config;
        EffectiveConfig {
            timeout: test
                .timeout
                .or(suite.timeout)
                .or(config.timeout)
                .unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_MS)),
            retry: test
                .retry
                .or(suite.retry)
                .or(config.retry)
                .unwrap_or(DEFAULT_RETRY),
        }
    }

    /// Run every selected suite in registration order
    ///
    /// Test failures are reported inside the returned results. An `Err` means
    /// the run could not take place at all.
    pub async fn run(&self) -> Result<Vec<SuiteResult>> {
        if self.inner.running.replace(true) {
            let error = Error::RunInProgress;
            self.report_error(&error);
            return Err(error);
        }
        let _running = RunGuard {
            running: &self.inner.running,
        };

        let (suites, focused) = {
            let mut state = self.inner.state.borrow_mut();
            state.has_focused = has_focused(state.suites.iter().map(Rc::as_ref));
            (state.suites.clone(), state.has_focused)
        };
        let document = self.document();

        let selected: Vec<&TestSuite> = suites
            .iter()
            .map(Rc::as_ref)
            .filter(|suite| !focused || suite.is_focused())
            .collect();
        let test_count: usize = selected
            .iter()
            .map(|suite| suite.selected_tests(focused).count())
            .sum();

        info!(suites = selected.len(), tests = test_count, focused, "Starting run");
        if let Some(on_start) = &self.inner.config.on_start {
            on_start(test_count);
        }

        let mut results = Vec::with_capacity(selected.len());
        for suite in selected {
            let result = self.run_suite(suite, &document, focused).await;
            let stop = self.inner.config.bail && result.has_failures();
            results.push(result);
            if stop {
                info!(suite = %suite.name, "Bailing out after failing suite");
                break;
            }
        }

        if !self.inner.events.is_empty() {
            self.emit(RunnerEvent::TestComplete {
                results: results.clone(),
            });
        }
        if let Some(on_complete) = &self.inner.config.on_complete {
            on_complete(&results);
        }
        Ok(results)
    }

    async fn run_suite(
        &self,
        suite: &TestSuite,
        document: &Document,
        focused: bool,
    ) -> SuiteResult {
        let start = Instant::now();
        let bail = self.inner.config.bail;
        let mut result = SuiteResult::new(&suite.name);
        debug!(suite = %suite.name, "Running suite");

        'tests: for test in suite.selected_tests(focused) {
            let selector = test
                .selector
                .as_deref()
                .or(suite.selector.as_deref())
                .unwrap_or(DEFAULT_SELECTOR);

            let elements = match document.query_all(selector) {
                Ok(elements) => elements,
                Err(error) => {
                    self.report_error(&error);
                    let record =
                        TestResult::harness_failure(&suite.name, &test.name, selector, &error);
                    self.record(&mut result, record);
                    if bail {
                        break 'tests;
                    }
                    continue;
                }
            };

            if elements.is_empty() {
                debug!(suite = %suite.name, test = %test.name, selector, "No matching elements");
                self.record(&mut result, TestResult::no_match(&suite.name, &test.name, selector));
                continue;
            }

            let total = elements.len();
            for (index, element) in elements.into_iter().enumerate() {
                let target = Target {
                    element,
                    selector,
                    document,
                    index,
                };
                let record = self.run_test(suite, test, target).await;
                let failed = record.outcome.is_failure();
                self.record(&mut result, record);
                self.emit(RunnerEvent::TestProgress {
                    suite: suite.name.clone(),
                    test: test.name.clone(),
                    completed: index + 1,
                    total,
                });
                if bail && failed {
                    info!(suite = %suite.name, test = %test.name, "Bailing out of suite");
                    break 'tests;
                }
            }
        }

        result.duration = start.elapsed();
        debug!(
            suite = %suite.name,
            passed = result.passed,
            failed = result.failed,
            duration_ms = result.duration.as_millis() as u64,
            "Suite finished"
        );
        result
    }

    fn record(&self, suite: &mut SuiteResult, result: TestResult) {
        if !self.inner.events.is_empty() {
            self.emit(RunnerEvent::TestResult {
                suite: suite.name.clone(),
                result: result.clone(),
            });
        }
        suite.record(result);
    }

    /// Execute one test against one element
    async fn run_test(
        &self,
        suite: &TestSuite,
        test: &TestDefinition,
        target: Target<'_>,
    ) -> TestResult {
        let element_selector = (self.inner.config.selector_generator)(target.element);
        let id = result_id(&suite.name, &test.name, &element_selector, target.index);

        if test.skip {
            return TestResult::new(id, &test.name, Outcome::Skip, "Skipped");
        }
        if let Some(reason) = &test.todo {
            return TestResult::new(id, &test.name, Outcome::Todo, todo_message(reason));
        }

        self.emit(RunnerEvent::TestStart {
            suite: suite.name.clone(),
            test: test.name.clone(),
            element: element_selector.clone(),
        });

        let EffectiveConfig { timeout, retry } = self.effective_config(suite, test);
        let start = Instant::now();
        let snapshot = ElementInfo::capture(target.element, element_selector);
        let ctx = TestContext::new(target.element, target.selector, target.document);

        let settled = {
            let ctx = &ctx;
            let func = &test.func;
            let before_each = suite.before_each.as_ref();
            let name = test.name.as_str();
            with_retry(name, retry, self.inner.config.retry_delay, move || async move {
                ctx.reset_intent();
                let attempt = catch_panic(async {
                    if let Some(hook) = before_each {
                        hook(ctx).await?;
                    }
                    func(ctx).await
                });
                match with_timeout(name, timeout, attempt).await {
                    Ok(outcome) => outcome,
                    Err(elapsed) => Err(TestFailure::Timeout(elapsed)),
                }
            })
            .await
        };

        let mut record = classify(id, &test.name, settled, ctx.intent(), retry);

        if let Some(hook) = &suite.after_each {
            if let Err(failure) = catch_panic(hook(&ctx)).await {
                warn!(
                    suite = %suite.name,
                    test = %test.name,
                    error = %failure,
                    "afterEach hook failed"
                );
                record.outcome = Outcome::Fail;
                record.message = format!("afterEach hook failed: {failure}");
                record.error = Some(failure.to_string());
            }
        }

        record.duration = start.elapsed();
        record.with_element(snapshot)
    }
}

/// Turn a settled (possibly retried) execution into a result record
fn classify(
    id: String,
    name: &str,
    settled: std::result::Result<Retried<()>, TestFailure>,
    intent: Intent,
    retry: u32,
) -> TestResult {
    match settled {
        Ok(Retried { attempts, .. }) => {
            let record = match intent {
                Intent::Skip => TestResult::new(id, name, Outcome::Skip, "Skipped at runtime"),
                Intent::Todo(reason) => TestResult::new(
                    id,
                    name,
                    Outcome::Todo,
                    todo_message(reason.as_deref().unwrap_or_default()),
                ),
                Intent::Pass if attempts > 1 => TestResult::new(
                    id,
                    name,
                    Outcome::Pass,
                    format!("passed after {attempts} attempts"),
                ),
                Intent::Pass => TestResult::new(id, name, Outcome::Pass, "passed"),
            };
            record.with_retries(attempts - 1)
        }
        Err(TestFailure::Timeout(elapsed)) => {
            let message = if retry > 0 {
                format!("{elapsed} ({} attempts)", retry + 1)
            } else {
                elapsed.to_string()
            };
            TestResult::new(id, name, Outcome::Timeout, message)
                .with_error(elapsed.to_string())
                .with_retries(retry)
        }
        Err(TestFailure::Expectation(message)) => {
            TestResult::new(id, name, Outcome::Fail, message).with_retries(retry)
        }
        Err(failure) => TestResult::new(id, name, Outcome::Fail, "Unexpected error")
            .with_error(failure.to_string())
            .with_retries(retry),
    }
}

fn todo_message(reason: &str) -> String {
    if reason.is_empty() {
        "Not implemented yet".to_string()
    } else {
        reason.to_string()
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Runner")
            .field("config", &self.inner.config)
            .field("suites", &state.suites.len())
            .field("has_focused", &state.has_focused)
            .field("running", &self.inner.running.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::ensure;

    const PAGE: &str = r#"<html><body>
        <img src="a.png" alt="first">
        <img src="b.png">
        <p class="note">hello</p>
    </body></html>"#;

    fn runner(config: RunnerConfig) -> Runner {
        Runner::new(Document::parse(PAGE), config)
    }

    fn passing<'a>(_ctx: &'a TestContext<'a>) -> TestFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    #[test]
    fn test_registration_is_additive() {
        let runner = runner(RunnerConfig::default());
        runner.describe("first", |r| r.test("a", passing)).unwrap();
        runner
            .describe("second", |r| {
                r.test("b", passing)?;
                r.test("c", passing)
            })
            .unwrap();

        let suites = runner.inspect();
        assert_eq!(suites.len(), 2);
        assert_eq!(suites[0].name, "first");
        assert_eq!(suites[1].tests.len(), 2);
    }

    #[test]
    fn test_test_outside_describe_fails() {
        let runner = runner(RunnerConfig::default());
        let err = runner.test("orphan", passing).unwrap_err();
        assert!(matches!(err, Error::NoActiveSuite { .. }));
        assert!(matches!(
            runner.before_each(passing).unwrap_err(),
            Error::NoActiveSuite { .. }
        ));
    }

    #[test]
    fn test_current_suite_cleared_after_failing_body() {
        let runner = runner(RunnerConfig::default());
        let err = runner
            .describe("broken", |r| {
                r.test("registered", passing)?;
                Err(Error::Config("body failed".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        // The partially registered suite is kept, and "current" is gone
        assert_eq!(runner.inspect()[0].tests.len(), 1);
        assert!(runner.test("late", passing).is_err());
    }

    #[test]
    fn test_nested_describe_rejected() {
        let runner = runner(RunnerConfig::default());
        let err = runner
            .describe("outer", |r| r.describe("inner", |_| Ok(())))
            .unwrap_err();
        assert!(matches!(err, Error::NestedSuite { ref parent, .. } if parent == "outer"));
        assert_eq!(runner.inspect().len(), 1);
    }

    #[test]
    fn test_clear_resets_registration() {
        let runner = runner(RunnerConfig::default());
        runner.describe("suite", |r| r.test("a", passing)).unwrap();
        runner.clear();
        assert!(runner.inspect().is_empty());
    }

    #[test]
    fn test_effective_config_precedence() {
        let runner = runner(
            RunnerConfig::new()
                .with_timeout(Duration::from_millis(300))
                .with_retry(1),
        );
        runner
            .describe_with(
                "suite",
                SuiteOptions::new().timeout(Duration::from_millis(200)),
                |r| {
                    r.test("inherits", passing)?;
                    r.test_with(
                        "overrides",
                        TestOptions::new()
                            .timeout(Duration::from_millis(100))
                            .retry(4),
                        passing,
                    )
                },
            )
            .unwrap();
        let suite = &runner.inspect()[0];

        assert_eq!(
            runner.effective_config(suite, &suite.tests[0]),
            EffectiveConfig {
                timeout: Duration::from_millis(200),
                retry: 1
            }
        );
        assert_eq!(
            runner.effective_config(suite, &suite.tests[1]),
            EffectiveConfig {
                timeout: Duration::from_millis(100),
                retry: 4
            }
        );

        let bare = Runner::with_document(Document::parse(PAGE));
        bare.describe("suite", |r| r.test("defaults", passing)).unwrap();
        let suite = &bare.inspect()[0];
        assert_eq!(
            bare.effective_config(suite, &suite.tests[0]),
            EffectiveConfig {
                timeout: Duration::from_millis(5000),
                retry: 0
            }
        );
    }

    #[tokio::test]
    async fn test_runs_once_per_matching_element() {
        let runner = runner(RunnerConfig::default());
        runner
            .describe_with("Images", SuiteOptions::new().selector("img"), |r| {
                r.test("has alt", |ctx| {
                    Box::pin(async move { ensure(ctx.attr("alt").is_some(), "missing alt") })
                })
            })
            .unwrap();

        let results = runner.run().await.unwrap();
        let suite = &results[0];
        assert_eq!(suite.tests.len(), 2);
        assert_eq!(suite.tests[0].outcome, Outcome::Pass);
        assert_eq!(suite.tests[1].outcome, Outcome::Fail);
        assert_eq!(suite.tests[1].message, "missing alt");
        assert_eq!((suite.passed, suite.failed), (1, 1));

        let element = suite.tests[1].element.as_ref().unwrap();
        assert_eq!(element.tag_name, "IMG");
        assert!(element.outer_html.contains("b.png"));
        assert_ne!(suite.tests[0].id, suite.tests[1].id);
    }

    #[tokio::test]
    async fn test_default_selector_is_body() {
        let runner = runner(RunnerConfig::default());
        runner
            .describe("Page", |r| {
                r.test("body", |ctx| {
                    Box::pin(async move {
                        ensure(ctx.element().value().name() == "body", "not body")
                    })
                })
            })
            .unwrap();

        let results = runner.run().await.unwrap();
        assert_eq!(results[0].tests.len(), 1);
        assert_eq!(results[0].tests[0].outcome, Outcome::Pass);
    }

    #[tokio::test]
    async fn test_invalid_selector_is_harness_failure() {
        let errors = Rc::new(Cell::new(0));
        let seen = Rc::clone(&errors);
        let runner = runner(RunnerConfig::new().on_error(move |_| seen.set(seen.get() + 1)));
        runner
            .describe("Broken", |r| {
                r.test_with("bad selector", TestOptions::new().selector("img["), passing)?;
                r.test_with("fine", TestOptions::new().selector("p"), passing)
            })
            .unwrap();

        let results = runner.run().await.unwrap();
        let tests = &results[0].tests;
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0].outcome, Outcome::Fail);
        assert!(tests[0].message.starts_with("Harness error"));
        assert_eq!(tests[1].outcome, Outcome::Pass);
        assert_eq!(errors.get(), 1);
    }

    #[tokio::test]
    async fn test_panicking_test_is_unexpected_failure() {
        let runner = runner(RunnerConfig::default());
        runner
            .describe_with("Panics", SuiteOptions::new().selector("p"), |r| {
                r.test("explodes", |ctx| {
                    Box::pin(async move {
                        assert!(ctx.text().is_empty(), "kaboom");
                        Ok(())
                    })
                })
            })
            .unwrap();

        let results = runner.run().await.unwrap();
        let record = &results[0].tests[0];
        assert_eq!(record.outcome, Outcome::Fail);
        assert_eq!(record.message, "Unexpected error");
        assert_eq!(record.error.as_deref(), Some("panicked: kaboom"));
    }

    #[tokio::test]
    async fn test_run_callbacks() {
        let started = Rc::new(Cell::new(None));
        let completed = Rc::new(Cell::new(None));
        let (s, c) = (Rc::clone(&started), Rc::clone(&completed));
        let runner = runner(
            RunnerConfig::new()
                .on_start(move |count| s.set(Some(count)))
                .on_complete(move |results| c.set(Some(results.len()))),
        );
        runner
            .describe("one", |r| {
                r.test("a", passing)?;
                r.test("b", passing)
            })
            .unwrap();
        runner.describe("two", |r| r.test("c", passing)).unwrap();

        runner.run().await.unwrap();
        assert_eq!(started.get(), Some(3));
        assert_eq!(completed.get(), Some(2));
    }

    #[tokio::test]
    async fn test_results_are_fresh_per_run() {
        let runner = runner(RunnerConfig::default());
        runner.describe("suite", |r| r.test("a", passing)).unwrap();

        let first = runner.run().await.unwrap();
        let second = runner.run().await.unwrap();
        assert_eq!(first[0].tests.len(), 1);
        assert_eq!(second[0].tests.len(), 1);
    }

    #[tokio::test]
    async fn test_colliding_generated_selectors_keep_ids_distinct() {
        let runner = runner(RunnerConfig::new().with_selector_generator(|_| "same".to_string()));
        runner
            .describe_with("s", SuiteOptions::new().selector("img"), |r| r.test("t", passing))
            .unwrap();

        let results = runner.run().await.unwrap();
        let ids: Vec<&str> = results[0].tests.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["s::t::same#0", "s::t::same#1"]);
        let element = results[0].tests[0].element.as_ref().unwrap();
        assert_eq!(element.selector, "same");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_delay_between_attempts() {
        let attempts = Rc::new(Cell::new(0));
        let seen = Rc::clone(&attempts);
        let runner = runner(
            RunnerConfig::new()
                .with_retry(2)
                .with_retry_delay(Duration::from_millis(100)),
        );
        runner
            .describe_with("Flaky", SuiteOptions::new().selector("p"), |r| {
                r.test("always fails", move |_ctx| {
                    seen.set(seen.get() + 1);
                    Box::pin(async { ensure(false, "nope") })
                })
            })
            .unwrap();

        let start = tokio::time::Instant::now();
        let results = runner.run().await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(attempts.get(), 3);
        assert_eq!(results[0].tests[0].outcome, Outcome::Fail);
        assert_eq!(results[0].tests[0].retries, Some(2));
        assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(300), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_bail_stops_after_timeout_only_suite() {
        let runner = runner(RunnerConfig::new().with_bail(true));
        runner
            .describe_with("Slow", SuiteOptions::new().selector("p"), |r| {
                let options = TestOptions::new().timeout(Duration::from_millis(10));
                r.test_with("hangs", options, |_ctx| {
                    Box::pin(async {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        Ok(())
                    })
                })
            })
            .unwrap();
        runner.describe("After", |r| r.test("a", passing)).unwrap();

        let results = runner.run().await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].failed, 0);
        assert_eq!(results[0].timeout, 1);
        assert_eq!(results[0].tests[0].outcome, Outcome::Timeout);
    }

    #[test]
    fn test_classify_messages() {
        let pass = classify(
            "id".to_string(),
            "t",
            Ok(Retried { result: (), attempts: 1 }),
            Intent::Pass,
            0,
        );
        assert_eq!(pass.message, "passed");
        assert_eq!(pass.retries, None);

        let todo = classify(
            "id".to_string(),
            "t",
            Ok(Retried { result: (), attempts: 1 }),
            Intent::Todo(None),
            0,
        );
        assert_eq!(todo.outcome, Outcome::Todo);
        assert_eq!(todo.message, "Not implemented yet");

        let unexpected = classify(
            "id".to_string(),
            "t",
            Err(TestFailure::unexpected("socket closed")),
            Intent::Pass,
            0,
        );
        assert_eq!(unexpected.message, "Unexpected error");
        assert_eq!(unexpected.error.as_deref(), Some("socket closed"));
    }
}
