//! Configuration paths
//!
//! Uses the directories crate for platform-appropriate locations.

use std::path::PathBuf;

/// Application name used for config directories
const APP_NAME: &str = "domcheck";

/// Get the configuration directory path
///
/// - Linux: `~/.config/domcheck/`
/// - macOS: `~/Library/Application Support/domcheck/`
/// - Windows: `%APPDATA%\domcheck\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}
