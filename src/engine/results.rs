//! Result records and per-suite aggregation

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::dom::ElementInfo;

/// Final verdict of one (test, element) execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Skip,
    Todo,
    Timeout,
}

impl Outcome {
    /// Outcomes that trigger bail and a failing exit status
    pub fn is_failure(self) -> bool {
        matches!(self, Outcome::Fail | Outcome::Timeout)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Pass => "pass",
            Outcome::Fail => "fail",
            Outcome::Skip => "skip",
            Outcome::Todo => "todo",
            Outcome::Timeout => "timeout",
        })
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Deterministic result id
///
/// The element's index among the selector's matches is part of the id, so two
/// elements whose generated selectors coincide still get distinct ids.
pub fn result_id(suite: &str, test: &str, element_selector: &str, index: usize) -> String {
    format!("{suite}::{test}::{element_selector}#{index}")
}

/// Result of one (test, element) execution
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub id: String,
    pub name: String,
    pub outcome: Outcome,
    pub message: String,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

impl TestResult {
    /// A result with zero duration and no element attached
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        outcome: Outcome,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            outcome,
            message: message.into(),
            duration: Duration::ZERO,
            error: None,
            element: None,
            retries: None,
        }
    }

    /// Skip record for a test whose selector matched nothing
    pub fn no_match(suite: &str, test: &str, selector: &str) -> Self {
        Self::new(
            result_id(suite, test, selector, 0),
            test,
            Outcome::Skip,
            format!("No elements found for selector \"{selector}\""),
        )
    }

    /// Failure record for an error raised by the harness rather than the test
    pub fn harness_failure(suite: &str, test: &str, selector: &str, error: &crate::Error) -> Self {
        Self::new(
            result_id(suite, test, selector, 0),
            test,
            Outcome::Fail,
            format!("Harness error: {error}"),
        )
        .with_error(error.to_string())
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_element(mut self, element: ElementInfo) -> Self {
        self.element = Some(element);
        self
    }

    /// Record the retries used; zero leaves the field empty
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = (retries > 0).then_some(retries);
        self
    }
}

/// Results of one suite, with counters kept in sync with `tests`
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteResult {
    pub name: String,
    pub tests: Vec<TestResult>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub todo: usize,
    pub timeout: usize,
}

impl SuiteResult {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append a result and bump the matching counter
    pub fn record(&mut self, result: TestResult) {
        match result.outcome {
            Outcome::Pass => self.passed += 1,
            Outcome::Fail => self.failed += 1,
            Outcome::Skip => self.skipped += 1,
            Outcome::Todo => self.todo += 1,
            Outcome::Timeout => self.timeout += 1,
        }
        self.tests.push(result);
    }

    /// Whether any result failed or timed out
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.timeout > 0
    }
}

/// Totals across a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub suites: usize,
    pub tests: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub todo: usize,
    pub timeout: usize,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl RunSummary {
    /// No failures and no timeouts
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.timeout == 0
    }
}

/// Roll suite results up into run totals
pub fn summarize(results: &[SuiteResult]) -> RunSummary {
    results.iter().fold(
        RunSummary {
            suites: results.len(),
            ..RunSummary::default()
        },
        |mut summary, suite| {
            summary.tests += suite.tests.len();
            summary.passed += suite.passed;
            summary.failed += suite.failed;
            summary.skipped += suite.skipped;
            summary.todo += suite.todo;
            summary.timeout += suite.timeout;
            summary.duration += suite.duration;
            summary
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(outcome: Outcome) -> TestResult {
        TestResult::new("id", "test", outcome, "message")
    }

    #[test]
    fn test_record_keeps_counters_in_sync() {
        let mut suite = SuiteResult::new("Forms");
        for outcome in [
            Outcome::Pass,
            Outcome::Pass,
            Outcome::Fail,
            Outcome::Skip,
            Outcome::Todo,
            Outcome::Timeout,
        ] {
            suite.record(result(outcome));
        }

        assert_eq!(suite.tests.len(), 6);
        assert_eq!(
            (suite.passed, suite.failed, suite.skipped, suite.todo, suite.timeout),
            (2, 1, 1, 1, 1)
        );
        assert!(suite.has_failures());
    }

    #[test]
    fn test_timeout_only_counts_as_failure() {
        let mut suite = SuiteResult::new("Slow");
        suite.record(result(Outcome::Timeout));
        assert_eq!(suite.failed, 0);
        assert!(suite.has_failures());
    }

    #[test]
    fn test_summarize() {
        let mut first = SuiteResult::new("a");
        first.record(result(Outcome::Pass));
        first.duration = Duration::from_millis(5);
        let mut second = SuiteResult::new("b");
        second.record(result(Outcome::Skip));
        second.record(result(Outcome::Fail));
        second.duration = Duration::from_millis(7);

        let summary = summarize(&[first, second]);
        assert_eq!(summary.suites, 2);
        assert_eq!(summary.tests, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.duration, Duration::from_millis(12));
        assert!(!summary.is_success());
        assert!(summarize(&[]).is_success());
    }

    #[test]
    fn test_result_id_includes_match_index() {
        assert_eq!(result_id("Images", "has alt", "img", 0), "Images::has alt::img#0");
        assert_ne!(
            result_id("Images", "has alt", "img", 0),
            result_id("Images", "has alt", "img", 1)
        );
    }

    #[test]
    fn test_no_match_result() {
        let record = TestResult::no_match("Images", "has alt", "img.hero");
        assert_eq!(record.outcome, Outcome::Skip);
        assert_eq!(record.duration, Duration::ZERO);
        assert!(record.message.contains("img.hero"));
    }

    #[test]
    fn test_serialized_shape() {
        let record = result(Outcome::Timeout)
            .with_duration(Duration::from_millis(1500))
            .with_retries(0);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["outcome"], "timeout");
        assert_eq!(json["duration_ms"], 1500);
        assert!(json.get("retries").is_none());
        assert!(json.get("element").is_none());
    }
}
