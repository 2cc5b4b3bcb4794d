//! Engine events and the plugin contract
//!
//! Plugins never take part in scheduling. They are installed once, may register
//! event listeners, and observe what the runner emits.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::results::{summarize, Outcome, SuiteResult, TestResult};
use super::runner::Runner;

/// Events emitted while a run progresses
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RunnerEvent {
    /// A test is about to run against one element
    TestStart {
        suite: String,
        test: String,
        element: String,
    },
    /// Elements of the current test processed so far
    TestProgress {
        suite: String,
        test: String,
        completed: usize,
        total: usize,
    },
    /// One result was recorded
    TestResult { suite: String, result: TestResult },
    /// The run finished
    TestComplete { results: Vec<SuiteResult> },
}

/// Handle returned by [`Runner::on_event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&RunnerEvent)>;

/// Ordered set of event listeners
#[derive(Default)]
pub(crate) struct EventBus {
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_id: Cell<u64>,
}

impl EventBus {
    pub(crate) fn subscribe(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    /// Deliver `event` to every listener registered when emission started
    pub(crate) fn emit(&self, event: &RunnerEvent) {
        // Snapshot so listeners may (un)subscribe while being called
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

/// An extension attached to a runner
pub trait Plugin {
    /// Unique name; a runner holds at most one plugin per name
    fn name(&self) -> &str;

    /// Called exactly once, synchronously, when the plugin is added
    fn install(&self, runner: &Runner);

    /// Called when the plugin is removed
    fn uninstall(&self, _runner: &Runner) {}
}

/// Logs every engine event through `tracing`
#[derive(Debug, Default)]
pub struct TracingReporter {
    listener: Cell<Option<ListenerId>>,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for TracingReporter {
    fn name(&self) -> &str {
        "tracing-reporter"
    }

    fn install(&self, runner: &Runner) {
        let id = runner.on_event(log_event);
        self.listener.set(Some(id));
    }

    fn uninstall(&self, runner: &Runner) {
        if let Some(id) = self.listener.take() {
            runner.off_event(id);
        }
    }
}

fn log_event(event: &RunnerEvent) {
    match event {
        RunnerEvent::TestStart {
            suite,
            test,
            element,
        } => debug!(suite = %suite, test = %test, element = %element, "Test started"),
        RunnerEvent::TestProgress {
            suite,
            test,
            completed,
            total,
        } => debug!(suite = %suite, test = %test, completed, total, "Test progress"),
        RunnerEvent::TestResult { suite, result } => match result.outcome {
            Outcome::Fail | Outcome::Timeout => warn!(
                suite = %suite,
                test = %result.name,
                outcome = %result.outcome,
                message = %result.message,
                "Test failed"
            ),
            _ => debug!(
                suite = %suite,
                test = %result.name,
                outcome = %result.outcome,
                duration_ms = result.duration.as_millis() as u64,
                "Test finished"
            ),
        },
        RunnerEvent::TestComplete { results } => {
            let summary = summarize(results);
            info!(
                suites = summary.suites,
                passed = summary.passed,
                failed = summary.failed,
                skipped = summary.skipped,
                todo = summary.todo,
                timeout = summary.timeout,
                "Run complete"
            );
        }
    }
}
