//! Backup archive construction.
//!
//! Packs selected extension directories and one settings snapshot into a
//! gzip-compressed tar archive:
//!
//! ```text
//! extensions/<name>/...   one tree per extension, in selection order
//! settings.dconf          configuration-store export, always last
//! ```

use std::fs;
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, EntryType, Header};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::domain::{
    extension_entry, AppError, ExtensionName, ExtensionSelection, Result, SETTINGS_ENTRY,
};
use crate::infrastructure::{ConfigStore, ExtensionRepository};

/// What a successful build wrote.
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    /// Extensions added, in archive order.
    pub added: Vec<ExtensionName>,
    /// Selected extensions missing from disk.
    pub skipped: Vec<ExtensionName>,
    /// Size of the settings snapshot in bytes.
    pub settings_bytes: usize,
}

/// Writes backup archives.
pub struct ArchiveBuilder<'a> {
    repository: &'a ExtensionRepository,
    store: &'a dyn ConfigStore,
    namespace: &'a str,
}

impl<'a> ArchiveBuilder<'a> {
    #[must_use]
    pub fn new(
        repository: &'a ExtensionRepository,
        store: &'a dyn ConfigStore,
        namespace: &'a str,
    ) -> Self {
        Self {
            repository,
            store,
            namespace,
        }
    }

    /// Build an archive at `destination` from `selection`.
    ///
    /// The archive is written to a temporary file next to the destination and
    /// renamed into place only once complete, so a failed build leaves nothing
    /// behind. Selected names with no directory on disk are skipped.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the destination exists and `overwrite` is not
    /// set, `ExternalTool` if the settings dump fails, or `Io` on write errors.
    pub fn build(
        &self,
        destination: &Path,
        selection: &ExtensionSelection,
        overwrite: bool,
    ) -> Result<BuildSummary> {
        if destination.is_dir() {
            return Err(AppError::invalid(format!(
                "Destination is a directory: {}",
                destination.display()
            )));
        }
        if destination.exists() && !overwrite {
            return Err(AppError::invalid(format!(
                "Destination already exists: {} (use --force to overwrite)",
                destination.display()
            )));
        }

        let settings = self.store.dump(self.namespace)?;

        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io(format!("Failed to create {}", parent.display()), e))?;

        let temp = tempfile::Builder::new()
            .prefix(".gnome-ext-backup-")
            .suffix(".partial")
            .tempfile_in(parent)
            .map_err(|e| AppError::io("Failed to create temporary archive", e))?;

        let mut summary = BuildSummary {
            settings_bytes: settings.len(),
            ..BuildSummary::default()
        };

        let encoder = GzEncoder::new(temp, Compression::default());
        let mut tar = Builder::new(encoder);
        tar.follow_symlinks(false);

        for name in selection {
            if !self.repository.exists(name) {
                tracing::warn!(extension = %name, "Selected extension not found on disk, skipping");
                summary.skipped.push(name.clone());
                continue;
            }

            append_tree(&mut tar, &self.repository.path_of(name), &extension_entry(name))?;
            tracing::debug!(extension = %name, "Added extension to archive");
            summary.added.push(name.clone());
        }

        append_settings(&mut tar, &settings)?;

        let temp = tar
            .into_inner()
            .map_err(|e| AppError::io("Failed to finalize archive", e))?
            .finish()
            .map_err(|e| AppError::io("Failed to finish compression", e))?;

        persist(temp, destination, overwrite)?;

        tracing::info!(
            path = %destination.display(),
            extensions = summary.added.len(),
            skipped = summary.skipped.len(),
            "Backup archive written"
        );

        Ok(summary)
    }
}

/// Append `dir` under `prefix`, walking entries in name order.
fn append_tree<W: Write>(tar: &mut Builder<W>, dir: &Path, prefix: &Path) -> Result<()> {
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let message = format!("Failed to walk {}", dir.display());
            match e.into_io_error() {
                Some(io) => AppError::io(message, io),
                None => AppError::Io {
                    message,
                    source: None,
                },
            }
        })?;

        let relative = entry.path().strip_prefix(dir).map_err(|_| AppError::Io {
            message: format!("Unexpected path {}", entry.path().display()),
            source: None,
        })?;
        let name = prefix.join(relative);

        let appended = if entry.file_type().is_dir() {
            tar.append_dir(&name, entry.path())
        } else {
            tar.append_path_with_name(entry.path(), &name)
        };
        appended.map_err(|e| {
            AppError::io(format!("Failed to add {} to archive", entry.path().display()), e)
        })?;
    }

    Ok(())
}

fn append_settings<W: Write>(tar: &mut Builder<W>, settings: &[u8]) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(settings.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default());
    header.set_cksum();

    tar.append_data(&mut header, SETTINGS_ENTRY, settings)
        .map_err(|e| AppError::io("Failed to add settings to archive", e))
}

fn persist(temp: NamedTempFile, destination: &Path, overwrite: bool) -> Result<()> {
    let persisted = if overwrite {
        temp.persist(destination)
    } else {
        temp.persist_noclobber(destination)
    };

    persisted.map(|_| ()).map_err(|e| {
        AppError::io(
            format!("Failed to move archive to {}", destination.display()),
            e.error,
        )
    })
}
