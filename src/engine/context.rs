//! Per-execution test context and test failure values

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::rc::Rc;

use futures_util::FutureExt;
use scraper::ElementRef;

use super::timeout::TimeoutError;
use crate::dom::{self, Document};

/// Future returned by test functions and lifecycle hooks
pub type TestFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TestFailure>> + 'a>>;

/// A test function or hook, invoked once per attempt with the current context
pub type TestFn = Rc<dyn for<'a> Fn(&'a TestContext<'a>) -> TestFuture<'a>>;

/// Box a closure as a [`TestFn`]
pub fn test_fn<F>(func: F) -> TestFn
where
    F: for<'a> Fn(&'a TestContext<'a>) -> TestFuture<'a> + 'static,
{
    Rc::new(func)
}

/// Why a test (or hook) did not succeed
///
/// Any `std::error::Error` converts into [`TestFailure::Unexpected`], so `?`
/// works inside test bodies. Use [`TestFailure::expectation`] (or [`ensure`])
/// for assertion failures whose message should be reported verbatim.
#[derive(Debug)]
pub enum TestFailure {
    /// An assertion about the element did not hold
    Expectation(String),
    /// The attempt did not settle before its deadline
    Timeout(TimeoutError),
    /// The test code panicked
    Panicked(String),
    /// Anything else the test code returned as an error
    Unexpected(Box<dyn std::error::Error + Send + Sync>),
}

impl TestFailure {
    /// An assertion failure with the given message
    pub fn expectation(message: impl Into<String>) -> Self {
        Self::Expectation(message.into())
    }

    /// An unexpected failure described only by a message
    pub fn unexpected(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Unexpected(message.into())
    }
}

impl fmt::Display for TestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestFailure::Expectation(message) => f.write_str(message),
            TestFailure::Timeout(e) => write!(f, "{e}"),
            TestFailure::Panicked(message) => write!(f, "panicked: {message}"),
            TestFailure::Unexpected(e) => write!(f, "{e}"),
        }
    }
}

impl<E> From<E> for TestFailure
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::Unexpected(Box::new(error))
    }
}

/// Fail with an expectation error unless `condition` holds
pub fn ensure(condition: bool, message: impl Into<String>) -> Result<(), TestFailure> {
    if condition {
        Ok(())
    } else {
        Err(TestFailure::expectation(message))
    }
}

/// Run `operation`, turning a panic into [`TestFailure::Panicked`]
pub(crate) async fn catch_panic<F>(operation: F) -> Result<(), TestFailure>
where
    F: Future<Output = Result<(), TestFailure>>,
{
    match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(TestFailure::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// What a test asked for at runtime, independent of errors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Intent {
    /// No runtime request; the verdict comes from the test's own result
    #[default]
    Pass,
    /// `skip()` was called
    Skip,
    /// `todo()` was called, with an optional reason
    Todo(Option<String>),
}

/// Context handed to a test function for one (test, element) execution
pub struct TestContext<'a> {
    element: ElementRef<'a>,
    selector: &'a str,
    document: &'a Document,
    intent: RefCell<Intent>,
}

impl<'a> TestContext<'a> {
    pub fn new(element: ElementRef<'a>, selector: &'a str, document: &'a Document) -> Self {
        Self {
            element,
            selector,
            document,
            intent: RefCell::new(Intent::Pass),
        }
    }

    /// The element under test
    pub fn element(&self) -> ElementRef<'a> {
        self.element
    }

    /// The selector that matched the element
    pub fn selector(&self) -> &'a str {
        self.selector
    }

    /// The whole document
    pub fn document(&self) -> &'a Document {
        self.document
    }

    /// Attribute value on the element under test
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Concatenated text content of the element under test
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    /// Descendants of the element under test matching `selector`
    pub fn select(&self, selector: &str) -> crate::Result<Vec<ElementRef<'a>>> {
        dom::select_within(self.element, selector)
    }

    /// Mark this execution as skipped. The test keeps running; an error still wins.
    pub fn skip(&self) {
        *self.intent.borrow_mut() = Intent::Skip;
    }

    /// Mark this execution as not implemented yet
    pub fn todo(&self) {
        *self.intent.borrow_mut() = Intent::Todo(None);
    }

    /// Mark this execution as not implemented yet, with a reason.
    /// An empty reason counts as no reason.
    pub fn todo_with_reason(&self, reason: impl Into<String>) {
        let reason = reason.into();
        *self.intent.borrow_mut() = Intent::Todo((!reason.is_empty()).then_some(reason));
    }

    /// The most recent runtime request
    pub fn intent(&self) -> Intent {
        self.intent.borrow().clone()
    }

    pub(crate) fn reset_intent(&self) {
        *self.intent.borrow_mut() = Intent::Pass;
    }
}

impl fmt::Debug for TestContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("element", &self.element.value().name())
            .field("selector", &self.selector)
            .field("intent", &self.intent.borrow())
            .finish()
    }
}
