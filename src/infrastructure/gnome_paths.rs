//! GNOME Shell path discovery.
//!
//! Locates the per-user extension directory and the config file location.

use std::path::PathBuf;

use crate::domain::AppConfig;

/// Extensions directory relative to the XDG data directory.
const EXTENSIONS_SUBDIR: &str = "gnome-shell/extensions";

/// Directory name used under the XDG config directory.
const APP_DIR_NAME: &str = "gnome-ext-backup";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Default location of user-installed extensions
/// (`~/.local/share/gnome-shell/extensions`).
#[must_use]
pub fn default_extensions_dir() -> PathBuf {
    let data_dir = dirs::data_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local/share")
    });

    let path = data_dir.join(EXTENSIONS_SUBDIR);
    tracing::debug!("Default extensions dir: {}", path.display());
    path
}

/// Extensions directory from `config`, or the GNOME default when unset.
#[must_use]
pub fn resolve_extensions_dir(config: &AppConfig) -> PathBuf {
    config
        .paths
        .extensions_dir
        .clone()
        .unwrap_or_else(default_extensions_dir)
}

/// Get the path to the configuration file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        })
        .join(APP_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}
