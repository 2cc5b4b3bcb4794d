//! Watch mode: re-run the whole registration on demand, debounced

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::results::SuiteResult;
use super::runner::{CompleteCallback, ErrorCallback, Runner};
use super::DEFAULT_DEBOUNCE_MS;
use crate::common::{Error, Result};

/// Watch mode settings
#[derive(Clone)]
pub struct WatchConfig {
    /// Quiet period after the last trigger before a re-run starts
    pub debounce: Duration,
    pub on_results: Option<CompleteCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl WatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn on_results(mut self, callback: impl Fn(&[SuiteResult]) + 'static) -> Self {
        self.on_results = Some(Rc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&Error) + 'static) -> Self {
        self.on_error = Some(Rc::new(callback));
        self
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            on_results: None,
            on_error: None,
        }
    }
}

impl fmt::Debug for WatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchConfig")
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

/// Handle to a running watch loop
#[derive(Clone)]
pub struct Watcher {
    requests: Rc<RefCell<Option<mpsc::UnboundedSender<()>>>>,
    running: Rc<Cell<bool>>,
    cycles: Rc<Cell<usize>>,
}

impl Watcher {
    /// Request a re-run. Requests inside the debounce window collapse into one.
    pub fn trigger(&self) {
        if !self.running.get() {
            return;
        }
        if let Some(requests) = self.requests.borrow().as_ref() {
            let _ = requests.send(());
        }
    }

    /// Stop watching. A pending re-run is cancelled; a run already in flight
    /// finishes, and later triggers do nothing.
    pub fn stop(&self) {
        if self.running.replace(false) {
            info!("Watch mode stopped");
        }
        self.requests.borrow_mut().take();
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Completed runs, including the initial one
    pub fn cycles(&self) -> usize {
        self.cycles.get()
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("running", &self.running.get())
            .field("cycles", &self.cycles.get())
            .finish()
    }
}

impl Runner {
    /// Run once now, then keep re-running whenever the returned watcher is
    /// triggered
    ///
    /// Results of every cycle go to `on_results`. Errors of debounced cycles go
    /// to `on_error`; an error in the initial run is returned.
    ///
    /// # Panics
    ///
    /// The debounce loop is spawned with [`tokio::task::spawn_local`], so this
    /// must be awaited inside a [`tokio::task::LocalSet`].
    pub async fn watch(&self, config: WatchConfig) -> Result<Watcher> {
        let results = self.run().await?;
        if let Some(on_results) = &config.on_results {
            on_results(&results);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = Watcher {
            requests: Rc::new(RefCell::new(Some(tx))),
            running: Rc::new(Cell::new(true)),
            cycles: Rc::new(Cell::new(1)),
        };

        info!(debounce_ms = config.debounce.as_millis() as u64, "Watch mode started");
        tokio::task::spawn_local(debounce_loop(
            self.clone(),
            config,
            rx,
            Rc::clone(&watcher.running),
            Rc::clone(&watcher.cycles),
        ));
        Ok(watcher)
    }
}

async fn debounce_loop(
    runner: Runner,
    config: WatchConfig,
    mut requests: mpsc::UnboundedReceiver<()>,
    running: Rc<Cell<bool>>,
    cycles: Rc<Cell<usize>>,
) {
    while requests.recv().await.is_some() {
        let mut deadline = Instant::now() + config.debounce;
        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(()) => deadline = Instant::now() + config.debounce,
                    None => {
                        debug!("Watcher stopped with a re-run pending");
                        return;
                    }
                },
                _ = tokio::time::sleep_until(deadline) => break,
            }
        }

        if !running.get() {
            return;
        }

        debug!(cycle = cycles.get() + 1, "Re-running suites");
        match runner.run().await {
            Ok(results) => {
                if let Some(on_results) = &config.on_results {
                    on_results(&results);
                }
            }
            Err(e) => match &config.on_error {
                Some(on_error) => on_error(&e),
                None => warn!(error = %e, "Watch cycle failed"),
            },
        }
        cycles.set(cycles.get() + 1);
    }
    debug!("Watch loop finished");
}
