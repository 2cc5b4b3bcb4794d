//! Registration-time data: suites, tests and their options

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::context::TestFn;

/// Options for a single test
#[derive(Debug, Clone, Default)]
pub struct TestOptions {
    pub selector: Option<String>,
    pub skip: bool,
    /// `Some("")` marks a todo without a reason
    pub todo: Option<String>,
    pub only: bool,
    pub timeout: Option<Duration>,
    pub retry: Option<u32>,
}

impl TestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run against elements matching `selector` instead of the suite's
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn skip(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn todo(mut self) -> Self {
        self.todo = Some(String::new());
        self
    }

    pub fn todo_with_reason(mut self, reason: impl Into<String>) -> Self {
        self.todo = Some(reason.into());
        self
    }

    pub fn only(mut self) -> Self {
        self.only = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, retries: u32) -> Self {
        self.retry = Some(retries);
        self
    }
}

/// Options for a suite
#[derive(Debug, Clone, Default)]
pub struct SuiteOptions {
    pub selector: Option<String>,
    pub only: bool,
    pub timeout: Option<Duration>,
    pub retry: Option<u32>,
}

impl SuiteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default selector for tests that do not name one
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn only(mut self) -> Self {
        self.only = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, retries: u32) -> Self {
        self.retry = Some(retries);
        self
    }
}

/// A registered test. Immutable once its suite is registered.
#[derive(Clone)]
pub struct TestDefinition {
    pub name: String,
    pub func: TestFn,
    pub selector: Option<String>,
    pub skip: bool,
    pub todo: Option<String>,
    pub only: bool,
    pub timeout: Option<Duration>,
    pub retry: Option<u32>,
}

impl TestDefinition {
    pub fn new(name: String, func: TestFn, options: TestOptions) -> Self {
        Self {
            name,
            func,
            selector: options.selector,
            skip: options.skip,
            todo: options.todo,
            only: options.only,
            timeout: options.timeout,
            retry: options.retry,
        }
    }
}

impl fmt::Debug for TestDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestDefinition")
            .field("name", &self.name)
            .field("selector", &self.selector)
            .field("skip", &self.skip)
            .field("todo", &self.todo)
            .field("only", &self.only)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// A named, ordered group of tests with a default selector and hooks
#[derive(Clone)]
pub struct TestSuite {
    pub name: String,
    pub tests: Vec<TestDefinition>,
    pub selector: Option<String>,
    pub before_each: Option<TestFn>,
    pub after_each: Option<TestFn>,
    pub only: bool,
    pub timeout: Option<Duration>,
    pub retry: Option<u32>,
}

impl TestSuite {
    pub fn new(name: String, options: SuiteOptions) -> Self {
        Self {
            name,
            tests: Vec::new(),
            selector: options.selector,
            before_each: None,
            after_each: None,
            only: options.only,
            timeout: options.timeout,
            retry: options.retry,
        }
    }

    /// Whether this suite takes part in a focused run
    pub fn is_focused(&self) -> bool {
        self.only || self.tests.iter().any(|test| test.only)
    }

    /// Whether `test` runs, given whether anything in the run is focused
    pub fn runs_test(&self, test: &TestDefinition, has_focused: bool) -> bool {
        !has_focused || self.only || test.only
    }

    /// Tests selected by the focus rules, in registration order
    pub fn selected_tests(&self, has_focused: bool) -> impl Iterator<Item = &TestDefinition> {
        self.tests
            .iter()
            .filter(move |test| self.runs_test(test, has_focused))
    }

    /// Read-only description of the suite for tooling
    pub fn summary(&self) -> SuiteSummary {
        SuiteSummary {
            name: self.name.clone(),
            selector: self.selector.clone(),
            only: self.only,
            has_before_each: self.before_each.is_some(),
            has_after_each: self.after_each.is_some(),
            tests: self
                .tests
                .iter()
                .map(|test| TestSummary {
                    name: test.name.clone(),
                    selector: test.selector.clone(),
                    skip: test.skip,
                    todo: test.todo.clone(),
                    only: test.only,
                })
                .collect(),
        }
    }
}

impl fmt::Debug for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSuite")
            .field("name", &self.name)
            .field("tests", &self.tests)
            .field("selector", &self.selector)
            .field("before_each", &self.before_each.is_some())
            .field("after_each", &self.after_each.is_some())
            .field("only", &self.only)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Whether any suite (or any test in it) is marked `only`
pub fn has_focused<'a>(suites: impl IntoIterator<Item = &'a TestSuite>) -> bool {
    suites.into_iter().any(TestSuite::is_focused)
}

/// Serializable view of a registered suite
#[derive(Debug, Clone, Serialize)]
pub struct SuiteSummary {
    pub name: String,
    pub selector: Option<String>,
    pub only: bool,
    pub has_before_each: bool,
    pub has_after_each: bool,
    pub tests: Vec<TestSummary>,
}

/// Serializable view of a registered test
#[derive(Debug, Clone, Serialize)]
pub struct TestSummary {
    pub name: String,
    pub selector: Option<String>,
    pub skip: bool,
    pub todo: Option<String>,
    pub only: bool,
}

/// Timeout and retry actually used for one test execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub timeout: Duration,
    pub retry: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::test_fn;

    fn noop() -> TestFn {
        test_fn(|_ctx| Box::pin(async { Ok(()) }))
    }

    fn suite(only: bool, tests: &[(&str, bool)]) -> TestSuite {
        let options = if only {
            SuiteOptions::new().only()
        } else {
            SuiteOptions::new()
        };
        let mut suite = TestSuite::new("suite".to_string(), options);
        for (name, test_only) in tests {
            let options = if *test_only {
                TestOptions::new().only()
            } else {
                TestOptions::new()
            };
            suite
                .tests
                .push(TestDefinition::new(name.to_string(), noop(), options));
        }
        suite
    }

    fn names<'a>(suite: &'a TestSuite, has_focused: bool) -> Vec<&'a str> {
        suite
            .selected_tests(has_focused)
            .map(|test| test.name.as_str())
            .collect()
    }

    #[test]
    fn test_unfocused_runs_everything() {
        let plain = suite(false, &[("a", false), ("b", false)]);
        assert!(!has_focused([&plain]));
        assert_eq!(names(&plain, false), vec!["a", "b"]);
    }

    #[test]
    fn test_focused_test_restricts_its_suite() {
        let focused = suite(false, &[("a", false), ("b", true)]);
        let other = suite(false, &[("c", false)]);
        assert!(has_focused([&focused, &other]));
        assert!(focused.is_focused());
        assert!(!other.is_focused());
        assert_eq!(names(&focused, true), vec!["b"]);
    }

    #[test]
    fn test_focused_suite_runs_all_its_tests() {
        let focused = suite(true, &[("a", false), ("b", false)]);
        assert_eq!(names(&focused, true), vec!["a", "b"]);
    }

    #[test]
    fn test_summary() {
        let summary = suite(true, &[("a", false)]).summary();
        assert_eq!(summary.name, "suite");
        assert!(summary.only);
        assert_eq!(summary.tests.len(), 1);
        assert!(!summary.has_before_each);
    }
}
