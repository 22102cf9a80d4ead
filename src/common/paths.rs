//! Configuration file locations
//!
//! A project-local `itest.toml` wins over the per-user file.

use std::path::{Path, PathBuf};

/// Name used for the per-user configuration directory
const APP_NAME: &str = "catalog-itest";

/// Name of the configuration file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "itest.toml";

/// Get the per-user configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/catalog-itest/`
/// - macOS: `~/Library/Application Support/catalog-itest/`
/// - Windows: `%APPDATA%\catalog-itest\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the per-user configuration file
pub fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Find the configuration file to load, if any
///
/// Checks `<base>/itest.toml` first, then the per-user file.
pub fn discover_config(base: &Path) -> Option<PathBuf> {
    let local = base.join(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    user_config_path().filter(|path| path.is_file())
}
