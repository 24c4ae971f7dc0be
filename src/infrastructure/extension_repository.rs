//! Extension directory access.
//!
//! Lists installed extensions and replaces extension directories wholesale.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::domain::{AppError, ExtensionName, Result};

/// Repository over the extensions root directory.
#[derive(Debug, Clone)]
pub struct ExtensionRepository {
    root: PathBuf,
}

impl ExtensionRepository {
    /// Create a repository rooted at `root`. The directory need not exist yet.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory of an extension, whether or not it exists.
    #[must_use]
    pub fn path_of(&self, name: &ExtensionName) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// List installed extensions, sorted by name.
    ///
    /// A missing root yields an empty list.
    ///
    /// # Errors
    /// Returns error if the root exists but cannot be read.
    pub fn list_extensions(&self) -> Result<Vec<ExtensionName>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root).map_err(|e| {
            AppError::io(
                format!("Failed to read extensions directory {}", self.root.display()),
                e,
            )
        })?;

        let mut names = Vec::new();
        for entry in entries.filter_map(std::result::Result::ok) {
            if !entry.path().is_dir() {
                continue;
            }

            let Some(raw) = entry.file_name().to_str().map(String::from) else {
                tracing::warn!(path = %entry.path().display(), "Skipping non UTF-8 extension name");
                continue;
            };

            match ExtensionName::new(raw) {
                Ok(name) => names.push(name),
                Err(e) => tracing::warn!(error = %e, "Skipping extension directory"),
            }
        }

        names.sort();
        Ok(names)
    }

    /// Whether an extension directory exists.
    #[must_use]
    pub fn exists(&self, name: &ExtensionName) -> bool {
        self.path_of(name).is_dir()
    }

    /// Create the extensions root (and parents) if absent.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| {
            AppError::io(
                format!("Failed to create extensions directory {}", self.root.display()),
                e,
            )
        })
    }

    /// Replace the live directory of `name` with a copy of `source`.
    ///
    /// Any existing directory is removed first; nothing is merged and a
    /// failure partway leaves the extension removed or half copied.
    ///
    /// # Errors
    /// Returns error if removal or copy fails.
    pub fn replace_directory(&self, name: &ExtensionName, source: &Path) -> Result<()> {
        self.ensure_root()?;

        let dest = self.path_of(name);
        if let Ok(metadata) = fs::symlink_metadata(&dest) {
            let removed = if metadata.is_dir() {
                fs::remove_dir_all(&dest)
            } else {
                fs::remove_file(&dest)
            };
            removed.map_err(|e| {
                AppError::io(format!("Failed to remove {}", dest.display()), e)
            })?;
            tracing::debug!(extension = %name, "Removed existing extension directory");
        }

        copy_tree(source, &dest)?;

        tracing::info!(extension = %name, "Extension directory replaced");
        Ok(())
    }
}

/// Recursively copy `source` to `dest`, recreating symlinks rather than following them.
fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|e| {
            let message = format!("Failed to walk {}", source.display());
            match e.into_io_error() {
                Some(io) => AppError::io(message, io),
                None => AppError::Io {
                    message,
                    source: None,
                },
            }
        })?;

        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| AppError::Io {
                message: format!("Unexpected path {}", entry.path().display()),
                source: None,
            })?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| AppError::io(format!("Failed to create {}", target.display()), e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)
                .map_err(|e| AppError::io(format!("Failed to copy {}", entry.path().display()), e))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    let pointee = fs::read_link(link)
        .map_err(|e| AppError::io(format!("Failed to read link {}", link.display()), e))?;
    std::os::unix::fs::symlink(&pointee, target)
        .map_err(|e| AppError::io(format!("Failed to create link {}", target.display()), e))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    fs::copy(link, target)
        .map(|_| ())
        .map_err(|e| AppError::io(format!("Failed to copy {}", link.display()), e))
}
