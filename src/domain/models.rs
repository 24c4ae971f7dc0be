//! Domain models for extension backups.
//!
//! These types describe what gets backed up, how it is laid out inside the
//! archive, and what a backup or restore reports back to its caller.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::error::{AppError, ErrorKind, Result};

/// Top-level archive directory holding one subtree per extension.
pub const EXTENSIONS_ENTRY: &str = "extensions";

/// Archive entry holding the configuration-store export.
pub const SETTINGS_ENTRY: &str = "settings.dconf";

/// Archive path of an extension's directory tree.
#[must_use]
pub fn extension_entry(name: &ExtensionName) -> PathBuf {
    Path::new(EXTENSIONS_ENTRY).join(name.as_str())
}

/// Name of an installed extension, equal to its directory's base name
/// (usually the extension UUID, e.g. `dash-to-dock@micxgx.gmail.com`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ExtensionName(String);

impl ExtensionName {
    /// Validate and wrap a directory base name.
    ///
    /// # Errors
    /// Returns `InvalidInput` for empty names, `.`/`..`, or names with path separators.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(AppError::invalid("Extension name cannot be empty"));
        }
        if name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(AppError::invalid(format!(
                "Extension name is not a plain directory name: {name}"
            )));
        }

        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExtensionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ExtensionName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Ordered set of extensions chosen for a backup.
///
/// Insertion order is kept; repeated names collapse to their first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionSelection {
    names: Vec<ExtensionName>,
}

impl ExtensionSelection {
    /// Create an empty selection.
    #[must_use]
    pub const fn new() -> Self {
        Self { names: Vec::new() }
    }

    /// Add a name, ignoring it if already selected. Returns whether it was added.
    pub fn insert(&mut self, name: ExtensionName) -> bool {
        if self.names.contains(&name) {
            return false;
        }
        self.names.push(name);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExtensionName> {
        self.names.iter()
    }
}

impl FromIterator<ExtensionName> for ExtensionSelection {
    fn from_iter<I: IntoIterator<Item = ExtensionName>>(iter: I) -> Self {
        let mut selection = Self::new();
        for name in iter {
            selection.insert(name);
        }
        selection
    }
}

impl<'a> IntoIterator for &'a ExtensionSelection {
    type Item = &'a ExtensionName;
    type IntoIter = std::slice::Iter<'a, ExtensionName>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.iter()
    }
}

/// Failure detail stored in a result record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationError {
    /// Class of failure.
    pub kind: ErrorKind,
    /// Human-readable summary.
    pub message: String,
}

impl From<&AppError> for OperationError {
    fn from(err: &AppError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of a backup operation.
#[derive(Debug, Clone, Serialize)]
pub struct BackupResult {
    /// Whether the archive was written.
    pub success: bool,
    /// Number of extension trees added to the archive.
    pub count: usize,
    /// Destination archive path.
    pub archive_path: PathBuf,
    /// Extensions added, in archive order.
    pub extensions: Vec<ExtensionName>,
    /// Selected extensions that were not on disk.
    pub skipped: Vec<ExtensionName>,
    /// Failure detail when `success` is false.
    pub error: Option<OperationError>,
}

impl BackupResult {
    /// Build a failed result.
    #[must_use]
    pub fn failed(archive_path: PathBuf, err: &AppError) -> Self {
        Self {
            success: false,
            count: 0,
            archive_path,
            extensions: Vec::new(),
            skipped: Vec::new(),
            error: Some(err.into()),
        }
    }
}

/// Outcome of a restore operation.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreResult {
    /// Whether every step completed.
    pub success: bool,
    /// Number of extension directories replaced, including before a failure.
    pub count: usize,
    /// Extensions replaced, in the order they were applied.
    pub restored: Vec<ExtensionName>,
    /// Whether the settings snapshot was loaded into the configuration store.
    pub settings_applied: bool,
    /// Whether the live extension listing changed and should be re-read.
    pub listing_stale: bool,
    /// Failure detail when `success` is false.
    pub error: Option<OperationError>,
}

/// Contents of an archive, read without extracting it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveSummary {
    /// Extensions present under `extensions/`, sorted.
    pub extensions: Vec<ExtensionName>,
    /// Whether a settings snapshot entry is present.
    pub has_settings: bool,
    /// Total number of archive entries.
    pub entry_count: usize,
}

/// The two top-level operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Backup,
    Restore,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backup => write!(f, "backup"),
            Self::Restore => write!(f, "restore"),
        }
    }
}

/// Coarse progress notification published by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Started(OperationKind),
    Succeeded { operation: OperationKind, count: usize },
    Failed { operation: OperationKind, message: String },
    /// The set of installed extensions changed on disk.
    ExtensionsChanged,
}
