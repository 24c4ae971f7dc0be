//! Application configuration model.
//!
//! Every location and external command the pipeline touches comes from here,
//! so tests and alternative front ends can point it anywhere.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Directory holding installed extensions.
    #[serde(default)]
    pub extensions_dir: Option<PathBuf>,

    /// Directory in which restore staging areas are created.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Directory for auto-named backup archives.
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
}

/// External configuration-store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Program used to dump and load settings.
    #[serde(default = "default_command")]
    pub command: String,

    /// Settings subtree that is exported and imported.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            namespace: default_namespace(),
        }
    }
}

fn default_command() -> String {
    "dconf".into()
}

fn default_namespace() -> String {
    "/org/gnome/shell/extensions/".into()
}

/// Backup behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Replace an existing archive at the destination path.
    #[serde(default)]
    pub overwrite: bool,

    /// Prefix of auto-generated archive names.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            overwrite: false,
            file_prefix: default_file_prefix(),
        }
    }
}

fn default_file_prefix() -> String {
    "gnome-extensions-backup".into()
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub settings: SettingsConfig,

    #[serde(default)]
    pub backup: BackupConfig,
}

impl AppConfig {
    /// Directory in which staging areas are created.
    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.paths.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Directory for auto-named backups.
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.paths
            .backup_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Archive name for a backup taken at `now`.
    #[must_use]
    pub fn backup_file_name<Tz>(&self, now: chrono::DateTime<Tz>) -> String
    where
        Tz: chrono::TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        format!(
            "{}-{}.tar.gz",
            self.backup.file_prefix,
            now.format("%Y%m%d-%H%M%S")
        )
    }
}
