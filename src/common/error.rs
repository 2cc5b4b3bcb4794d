//! Error types for the DOM test runner
//!
//! Harness-level errors only. Failures raised by test code are carried by
//! [`crate::engine::TestFailure`] and end up inside result records instead.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the runner
#[derive(Error, Debug)]
pub enum Error {
    // === Registration Errors ===
    #[error("{call} called outside of a describe block")]
    NoActiveSuite { call: String },

    #[error("Cannot register suite '{name}' inside suite '{parent}': suites do not nest")]
    NestedSuite { name: String, parent: String },

    // === Execution Errors ===
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("A run is already in progress on this runner")]
    RunInProgress,

    // === Plugin Errors ===
    #[error("Plugin '{0}' is already installed")]
    DuplicatePlugin(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid suite file '{path}': {reason}")]
    SuiteFile { path: String, reason: String },

    // === Watch Errors ===
    #[error("File watch error: {0}")]
    Watch(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid selector error
    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a suite file error
    pub fn suite_file(path: &std::path::Path, reason: impl ToString) -> Self {
        Self::SuiteFile {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-readable code shown alongside CLI errors
    pub fn code(&self) -> &'static str {
        match self {
            Error::NoActiveSuite { .. } => "NO_ACTIVE_SUITE",
            Error::NestedSuite { .. } => "NESTED_SUITE",
            Error::InvalidSelector { .. } => "INVALID_SELECTOR",
            Error::RunInProgress => "RUN_IN_PROGRESS",
            Error::DuplicatePlugin(_) => "DUPLICATE_PLUGIN",
            Error::Config(_) | Error::ConfigParse(_) => "CONFIG",
            Error::SuiteFile { .. } => "SUITE_FILE",
            Error::Watch(_) => "WATCH",
            _ => "INTERNAL_ERROR",
        }
    }
}
