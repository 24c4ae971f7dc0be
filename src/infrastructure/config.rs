//! Configuration file management.
//!
//! Handles loading and initialising the TOML configuration file.

use std::fs;
use std::path::Path;

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# GNOME Extensions Backup Configuration
# Auto-generated - edit as needed

[paths]
# Installed extensions (defaults to ~/.local/share/gnome-shell/extensions)
# extensions_dir = "/custom/path"

# Where restore staging directories are created (defaults to the system temp dir)
# temp_dir = "/var/tmp"

# Where auto-named backups are written (defaults to the current directory)
# backup_dir = "/home/me/Backups"

[settings]
# Program used to export and import settings
command = "dconf"

# Settings subtree saved alongside the extensions
namespace = "/org/gnome/shell/extensions/"

[backup]
# Replace an existing archive at the destination
overwrite = false

# Prefix for generated archive names
file_prefix = "gnome-extensions-backup"
"#;

/// Load configuration from `path`, or from the default location.
///
/// A missing file yields the built-in defaults.
///
/// # Errors
/// Returns error if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config_path = path.map_or_else(super::config_file_path, Path::to_path_buf);

    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        tracing::debug!(path = %config_path.display(), "No config file, using defaults");
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })
}

/// Render a configuration as TOML.
///
/// # Errors
/// Returns error if serialization fails.
pub fn render_config(config: &AppConfig) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| AppError::Config {
        message: format!("Failed to serialize config: {e}"),
    })
}

/// Create the default configuration file at `path` if it doesn't exist.
///
/// Returns whether a file was written.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| AppError::io("Failed to create default config", e))?;

    tracing::info!(path = %path.display(), "Created default configuration");

    Ok(true)
}
