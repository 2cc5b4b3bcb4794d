//! Configuration file handling

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::paths::config_path;
use super::Result;
use crate::engine::{RunnerConfig, WatchConfig};

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Engine defaults
    #[serde(default)]
    pub runner: RunnerSettings,

    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchSettings,
}

/// Engine defaults applied when neither the test nor its suite says otherwise
#[derive(Debug, Deserialize)]
pub struct RunnerSettings {
    /// Per-test timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Additional attempts after a failure
    #[serde(default)]
    pub retry: u32,

    /// Pause between attempts in milliseconds
    #[serde(default)]
    pub retry_delay_ms: u64,

    /// Stop at the first fail/timeout result
    #[serde(default)]
    pub bail: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout(),
            retry: 0,
            retry_delay_ms: 0,
            bail: false,
        }
    }
}

fn default_timeout() -> u64 {
    crate::engine::DEFAULT_TIMEOUT_MS
}

/// Watch mode settings
#[derive(Debug, Deserialize)]
pub struct WatchSettings {
    /// Debounce window for re-run requests in milliseconds
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
        }
    }
}

fn default_debounce() -> u64 {
    crate::engine::DEFAULT_DEBOUNCE_MS
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Engine configuration derived from the `[runner]` table
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig::new()
            .with_timeout(Duration::from_millis(self.runner.timeout_ms))
            .with_retry(self.runner.retry)
            .with_retry_delay(Duration::from_millis(self.runner.retry_delay_ms))
            .with_bail(self.runner.bail)
    }

    /// Watch configuration derived from the `[watch]` table
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig::new().with_debounce(Duration::from_millis(self.watch.debounce_ms))
    }
}
