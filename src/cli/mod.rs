//! CLI command handling
//!
//! Builds a runner from the config file and flags, loads suite files into it
//! and formats results for the terminal.

use std::path::{Path, PathBuf};
use std::time::Duration;

use colored::Colorize;
use notify::{Event, EventKind, RecursiveMode, Watcher as _};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::dom::Document;
use crate::engine::{
    summarize, Outcome, RunSummary, Runner, RunnerConfig, SuiteResult, SuiteSummary,
    TracingReporter,
};
use crate::testing;

/// Dispatch a CLI command
///
/// Returns whether the command succeeded; a run with failing or timed out
/// tests is not an error but still reports failure.
pub async fn dispatch(command: Commands) -> Result<bool> {
    match command {
        Commands::Run {
            suites,
            html,
            config,
            timeout,
            retry,
            bail,
            no_bail,
            json,
        } => {
            let settings = load_config(config.as_deref())?;
            let flags = RunFlags {
                timeout,
                retry,
                bail: bail_flag(bail, no_bail),
            };
            let mut runner_config = flags.apply(settings.runner_config());
            if !json {
                runner_config = runner_config
                    .on_start(|count| println!("{} {count} test(s)\n", "Running".blue().bold()));
            }

            let runner = Runner::new(Document::load(&html)?, runner_config);
            runner.use_plugin(TracingReporter::new())?;
            testing::load_suites(&runner, &suites)?;

            let results = runner.run().await?;
            let summary = summarize(&results);
            if json {
                let report = Report {
                    summary: &summary,
                    suites: &results,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_results(&results);
            }
            Ok(summary.is_success())
        }

        Commands::Watch {
            suites,
            html,
            config,
            debounce,
        } => {
            let settings = load_config(config.as_deref())?;
            let runner = Runner::new(Document::load(&html)?, settings.runner_config());
            runner.use_plugin(TracingReporter::new())?;
            testing::load_suites(&runner, &suites)?;

            let mut watch_config = settings.watch_config();
            if let Some(ms) = debounce {
                watch_config = watch_config.with_debounce(Duration::from_millis(ms));
            }
            watch(&runner, &html, &suites, watch_config).await?;
            Ok(true)
        }

        Commands::Inspect { suites, json } => {
            let runner = Runner::with_document(Document::parse(""));
            testing::load_suites(&runner, &suites)?;

            let summaries: Vec<SuiteSummary> =
                runner.inspect().iter().map(|suite| suite.summary()).collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else if summaries.is_empty() {
                println!("No suites registered");
            } else {
                for suite in &summaries {
                    print_suite_summary(suite);
                }
            }
            Ok(true)
        }
    }
}

/// Command-line overrides for the `[runner]` config section
#[derive(Debug, Default)]
struct RunFlags {
    timeout: Option<u64>,
    retry: Option<u32>,
    bail: Option<bool>,
}

impl RunFlags {
    fn apply(&self, mut config: RunnerConfig) -> RunnerConfig {
        if let Some(ms) = self.timeout {
            config = config.with_timeout(Duration::from_millis(ms));
        }
        if let Some(retry) = self.retry {
            config = config.with_retry(retry);
        }
        if let Some(bail) = self.bail {
            config = config.with_bail(bail);
        }
        config
    }
}

/// `--bail` / `--no-bail`; neither keeps the config file's value
fn bail_flag(bail: bool, no_bail: bool) -> Option<bool> {
    match (bail, no_bail) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

#[derive(Serialize)]
struct Report<'a> {
    summary: &'a RunSummary,
    suites: &'a [SuiteResult],
}

/// Run `runner` in watch mode until Ctrl-C, re-running when the document or a
/// suite file changes
async fn watch(
    runner: &Runner,
    html: &Path,
    suites: &[PathBuf],
    config: crate::engine::WatchConfig,
) -> Result<()> {
    let config = config
        .on_results(|results| {
            print_results(results);
            println!("{}", "Waiting for changes...".dimmed());
        })
        .on_error(|e| eprintln!("{} {e}", "Error:".red().bold()));

    let (tx, mut changes) = mpsc::unbounded_channel();
    let mut fs_watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
        let _ = tx.send(event);
    })
    .map_err(|e| Error::Watch(e.to_string()))?;

    fs_watcher
        .watch(html, RecursiveMode::NonRecursive)
        .map_err(|e| Error::Watch(format!("{}: {e}", html.display())))?;
    for path in suites {
        let mode = if path.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        fs_watcher
            .watch(path, mode)
            .map_err(|e| Error::Watch(format!("{}: {e}", path.display())))?;
    }

    let watcher = runner.watch(config).await?;
    info!("Watching {} path(s), press Ctrl-C to stop", suites.len() + 1);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = changes.recv() => match change {
                Some(Ok(event)) if is_content_change(&event.kind) => {
                    debug!(paths = ?event.paths, "Change detected");
                    match reload(runner, html, suites) {
                        Ok(()) => watcher.trigger(),
                        Err(e) => eprintln!("{} {e}", "Reload failed:".red().bold()),
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => warn!(error = %e, "File watch error"),
                None => break,
            },
        }
    }

    watcher.stop();
    println!("\n{}", "Stopped watching".dimmed());
    Ok(())
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Reload the document and re-register every suite
///
/// All files are parsed before anything is replaced, so a broken edit leaves
/// the previous registration in place.
fn reload(runner: &Runner, html: &Path, suites: &[PathBuf]) -> Result<()> {
    let document = Document::load(html)?;
    let files = testing::collect_suite_paths(suites)?
        .iter()
        .map(|path| testing::load_suite_file(path))
        .collect::<Result<Vec<_>>>()?;

    runner.set_document(document);
    runner.clear();
    for file in files {
        testing::register_suites(runner, file)?;
    }
    Ok(())
}

fn print_results(results: &[SuiteResult]) {
    for suite in results {
        println!("{}", suite.name.white().bold());
        for test in &suite.tests {
            print_test_result(test);
        }
        println!();
    }
    print_summary(&summarize(results));
}

fn print_test_result(test: &crate::engine::TestResult) {
    let marker = match test.outcome {
        Outcome::Pass => "✓".green(),
        Outcome::Fail => "✗".red(),
        Outcome::Timeout => "⏱".red(),
        Outcome::Skip => "○".yellow(),
        Outcome::Todo => "…".cyan(),
    };
    let target = test
        .element
        .as_ref()
        .map(|element| format!(" [{}]", element.selector))
        .unwrap_or_default();
    let duration = format!("({}ms)", test.duration.as_millis());

    match test.outcome {
        Outcome::Pass if test.retries.is_none() => {
            println!("  {marker} {}{} {}", test.name, target.dimmed(), duration.dimmed());
        }
        _ => {
            println!(
                "  {marker} {}{} {} - {}",
                test.name,
                target.dimmed(),
                duration.dimmed(),
                test.message
            );
            if let Some(error) = test.error.as_deref().filter(|e| *e != test.message) {
                println!("      {}", error.dimmed());
            }
        }
    }
}

fn print_summary(summary: &RunSummary) {
    let mut parts = vec![format!("{} passed", summary.passed).green().to_string()];
    if summary.failed > 0 {
        parts.push(format!("{} failed", summary.failed).red().to_string());
    }
    if summary.timeout > 0 {
        parts.push(format!("{} timed out", summary.timeout).red().to_string());
    }
    if summary.skipped > 0 {
        parts.push(format!("{} skipped", summary.skipped).yellow().to_string());
    }
    if summary.todo > 0 {
        parts.push(format!("{} todo", summary.todo).cyan().to_string());
    }

    let status = if summary.is_success() {
        "PASS".green().bold()
    } else {
        "FAIL".red().bold()
    };
    println!(
        "{status} {} ({} results in {} suite(s), {}ms)",
        parts.join(", "),
        summary.tests,
        summary.suites,
        summary.duration.as_millis()
    );
}

fn print_suite_summary(suite: &SuiteSummary) {
    let mut header = suite.name.white().bold().to_string();
    if let Some(selector) = &suite.selector {
        header.push_str(&format!(" {}", selector.dimmed()));
    }
    if suite.only {
        header.push_str(&format!(" {}", "(only)".yellow()));
    }
    println!("{header}");

    for test in &suite.tests {
        let flags = [
            test.only.then(|| "only".to_string()),
            test.skip.then(|| "skip".to_string()),
            test.todo.as_ref().map(|reason| {
                if reason.is_empty() {
                    "todo".to_string()
                } else {
                    format!("todo: {reason}")
                }
            }),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");

        let selector = test.selector.as_deref().unwrap_or_default();
        if flags.is_empty() {
            println!("  - {} {}", test.name, selector.dimmed());
        } else {
            println!("  - {} {} ({})", test.name, selector.dimmed(), flags.yellow());
        }
    }
}
