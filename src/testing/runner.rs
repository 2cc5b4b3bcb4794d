//! Suite file loading and check evaluation
//!
//! Compiles YAML suite files into ordinary engine registrations. Each test
//! becomes a test function that evaluates its checks against the element it
//! runs on.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::common::{Error, Result};
use crate::engine::{ensure, test_fn, Runner, SuiteOptions, TestContext, TestFailure, TestOptions};

use super::config::{Check, SuiteFile, SuiteSpec, TestSpec, TodoSpec};

/// Parse a suite file from YAML text. `origin` is only used in error messages.
pub fn parse_suite_file(content: &str, origin: &Path) -> Result<SuiteFile> {
    let file: SuiteFile =
        serde_yaml::from_str(content).map_err(|e| Error::suite_file(origin, e))?;

    for suite in &file.suites {
        if suite.name.trim().is_empty() {
            return Err(Error::suite_file(origin, "suite with an empty name"));
        }
        if suite.tests.iter().any(|t| t.name.trim().is_empty()) {
            return Err(Error::suite_file(
                origin,
                format!("test with an empty name in suite '{}'", suite.name),
            ));
        }
    }
    Ok(file)
}

/// Read and parse a suite file
pub fn load_suite_file(path: &Path) -> Result<SuiteFile> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    parse_suite_file(&content, path)
}

/// Expand `paths` into suite files: files are taken as given, directories
/// contribute their `*.yaml`/`*.yml` entries in name order.
pub fn collect_suite_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut collected = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    p.is_file()
                        && matches!(
                            p.extension().and_then(|ext| ext.to_str()),
                            Some("yaml" | "yml")
                        )
                })
                .collect();
            entries.sort();
            collected.extend(entries);
        } else {
            collected.push(path.clone());
        }
    }
    Ok(collected)
}

/// Load every suite file under `paths` into `runner`. Returns the number of
/// tests registered.
pub fn load_suites(runner: &Runner, paths: &[PathBuf]) -> Result<usize> {
    let mut registered = 0;
    for path in collect_suite_paths(paths)? {
        let file = load_suite_file(&path)?;
        let count = register_suites(runner, file)?;
        debug!(path = %path.display(), tests = count, "Loaded suite file");
        registered += count;
    }
    Ok(registered)
}

/// Register every suite of `file` with `runner`. Returns the number of tests
/// registered.
pub fn register_suites(runner: &Runner, file: SuiteFile) -> Result<usize> {
    let mut registered = 0;
    for suite in file.suites {
        registered += suite.tests.len();
        register_suite(runner, suite)?;
    }
    Ok(registered)
}

fn register_suite(runner: &Runner, suite: SuiteSpec) -> Result<()> {
    let mut options = SuiteOptions::new();
    if let Some(selector) = suite.selector {
        options = options.selector(selector);
    }
    if suite.only {
        options = options.only();
    }
    if let Some(ms) = suite.timeout_ms {
        options = options.timeout(Duration::from_millis(ms));
    }
    if let Some(retry) = suite.retry {
        options = options.retry(retry);
    }

    let tests = suite.tests;
    runner.describe_with(suite.name, options, move |r| {
        for test in tests {
            register_test(r, test)?;
        }
        Ok(())
    })
}

fn register_test(runner: &Runner, test: TestSpec) -> Result<()> {
    let mut options = TestOptions::new();
    if let Some(selector) = test.selector {
        options = options.selector(selector);
    }
    if test.skip {
        options = options.skip();
    }
    match test.todo {
        Some(TodoSpec::Flag(true)) => options = options.todo(),
        Some(TodoSpec::Reason(reason)) => options = options.todo_with_reason(reason),
        Some(TodoSpec::Flag(false)) | None => {}
    }
    if test.only {
        options = options.only();
    }
    if let Some(ms) = test.timeout_ms {
        options = options.timeout(Duration::from_millis(ms));
    }
    if let Some(retry) = test.retry {
        options = options.retry(retry);
    }

    let checks: Rc<[Check]> = test.expect.into();
    let skip_unless: Option<Rc<str>> = test.skip_unless.map(Into::into);
    let func = test_fn(move |ctx| {
        let checks = Rc::clone(&checks);
        let skip_unless = skip_unless.clone();
        Box::pin(async move { run_checks(ctx, skip_unless.as_deref(), &checks) })
    });
    runner.add_test(test.name, options, func)
}

/// Evaluate `checks` in order, stopping at the first failure
pub fn run_checks(
    ctx: &TestContext<'_>,
    skip_unless: Option<&str>,
    checks: &[Check],
) -> std::result::Result<(), TestFailure> {
    if let Some(selector) = skip_unless {
        if ctx.select(selector)?.is_empty() {
            ctx.skip();
            return Ok(());
        }
    }
    for check in checks {
        evaluate(check, ctx)?;
    }
    Ok(())
}

/// Evaluate one check against the context's element
pub fn evaluate(check: &Check, ctx: &TestContext<'_>) -> std::result::Result<(), TestFailure> {
    let name = check.name();
    match check {
        Check::HasAttribute { name: attr } => ensure(
            ctx.attr(attr).is_some(),
            format!("{name}: missing attribute \"{attr}\""),
        ),
        Check::AttributeEquals { name: attr, value } => match ctx.attr(attr) {
            Some(actual) if actual == value => Ok(()),
            Some(actual) => Err(TestFailure::expectation(format!(
                "{name}: expected {attr}=\"{value}\", found \"{actual}\""
            ))),
            None => Err(TestFailure::expectation(format!(
                "{name}: missing attribute \"{attr}\""
            ))),
        },
        Check::TextContains { value } => ensure(
            ctx.text().contains(value.as_str()),
            format!("{name}: text does not contain \"{value}\""),
        ),
        Check::Contains { selector } => ensure(
            !ctx.select(selector)?.is_empty(),
            format!("{name}: no descendant matches \"{selector}\""),
        ),
        Check::TagName { value } => {
            let tag = ctx.element().value().name();
            ensure(
                tag.eq_ignore_ascii_case(value),
                format!("{name}: expected <{value}>, found <{tag}>"),
            )
        }
        Check::NotEmpty => {
            let element = ctx.element();
            let has_children = element.children().any(|child| child.value().is_element());
            ensure(
                has_children || !ctx.text().trim().is_empty(),
                format!("{name}: element is empty"),
            )
        }
    }
}
