//! Backup archive extraction and application.
//!
//! An archive is fully unpacked into a private staging directory before any
//! live state is touched. Extensions are then swapped in one at a time,
//! followed by the settings snapshot.

use std::fs::{self, File};
use std::path::{Component, Path};

use flate2::read::GzDecoder;
use tar::Archive;
use tempfile::TempDir;

use crate::domain::{
    AppError, ArchiveSummary, ExtensionName, Result, EXTENSIONS_ENTRY, SETTINGS_ENTRY,
};
use crate::infrastructure::{ConfigStore, ExtensionRepository};

/// Progress of a restore, returned on success and on failure.
#[derive(Debug, Default)]
pub struct RestoreProgress {
    /// Extensions replaced so far, in application order.
    pub restored: Vec<ExtensionName>,
    /// Whether the settings snapshot was loaded.
    pub settings_applied: bool,
}

/// A restore that stopped partway.
#[derive(Debug)]
pub struct RestoreFailure {
    /// What was applied before the error.
    pub progress: RestoreProgress,
    pub error: AppError,
}

impl From<AppError> for RestoreFailure {
    fn from(error: AppError) -> Self {
        Self {
            progress: RestoreProgress::default(),
            error,
        }
    }
}

/// Where an archive entry belongs in the layout.
#[derive(Debug, PartialEq, Eq)]
enum EntryKind<'p> {
    /// Somewhere under `extensions/<name>`.
    Extension(&'p str),
    /// The `extensions/` directory itself.
    ExtensionsRoot,
    Settings,
    Unknown,
}

fn classify(path: &Path) -> EntryKind<'_> {
    let mut parts = path.components().filter(|c| !matches!(c, Component::CurDir));
    match (parts.next(), parts.next()) {
        (Some(Component::Normal(first)), None) if first == SETTINGS_ENTRY => EntryKind::Settings,
        (Some(Component::Normal(first)), None) if first == EXTENSIONS_ENTRY => {
            EntryKind::ExtensionsRoot
        }
        (Some(Component::Normal(first)), Some(Component::Normal(name)))
            if first == EXTENSIONS_ENTRY =>
        {
            name.to_str().map_or(EntryKind::Unknown, EntryKind::Extension)
        }
        _ => EntryKind::Unknown,
    }
}

/// Whether `path` is `extensions`, `extensions/<name>` or the settings entry.
fn is_layout_anchor(path: &Path) -> bool {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .count()
        <= 2
}

/// Applies backup archives to the live system.
pub struct ArchiveRestorer<'a> {
    repository: &'a ExtensionRepository,
    store: &'a dyn ConfigStore,
    namespace: &'a str,
    staging_root: &'a Path,
}

impl<'a> ArchiveRestorer<'a> {
    #[must_use]
    pub fn new(
        repository: &'a ExtensionRepository,
        store: &'a dyn ConfigStore,
        namespace: &'a str,
        staging_root: &'a Path,
    ) -> Self {
        Self {
            repository,
            store,
            namespace,
            staging_root,
        }
    }

    /// Restore `source` into the extensions directory and configuration store.
    ///
    /// Each extension in the archive replaces the live directory of the same
    /// name. The first failing extension stops the restore; replacements made
    /// before it are kept and reported in the failure's progress.
    ///
    /// # Errors
    /// `ArchiveFormat` if the archive cannot be read or lacks the settings
    /// entry (nothing is modified),
    /// `Io` if a directory replacement fails, `ExternalTool` if the settings
    /// load fails.
    pub fn restore(&self, source: &Path) -> std::result::Result<RestoreProgress, RestoreFailure> {
        let staging = self.create_staging()?;

        let outcome = extract(source, staging.path()).map_err(RestoreFailure::from);
        let outcome = outcome.and_then(|()| self.apply(staging.path()));

        let staging_path = staging.path().to_path_buf();
        if let Err(e) = staging.close() {
            tracing::warn!(path = %staging_path.display(), error = %e, "Failed to remove staging directory");
        }

        outcome
    }

    /// Read an archive without extracting it.
    ///
    /// # Errors
    /// Returns `ArchiveFormat` if the archive cannot be read.
    pub fn inspect(source: &Path) -> Result<ArchiveSummary> {
        let mut archive = open_archive(source)?;
        let mut summary = ArchiveSummary::default();

        let entries = archive
            .entries()
            .map_err(|e| AppError::archive("Failed to read archive entries", e))?;

        for entry in entries {
            let entry = entry.map_err(|e| AppError::archive("Failed to read archive entry", e))?;
            let path = entry
                .path()
                .map_err(|e| AppError::archive("Invalid path in archive entry", e))?;

            summary.entry_count += 1;
            match classify(&path) {
                EntryKind::Extension(name) => {
                    if let Ok(name) = ExtensionName::new(name) {
                        if !summary.extensions.contains(&name) {
                            summary.extensions.push(name);
                        }
                    }
                }
                EntryKind::Settings => summary.has_settings = true,
                EntryKind::ExtensionsRoot | EntryKind::Unknown => {}
            }
        }

        summary.extensions.sort();
        Ok(summary)
    }

    fn create_staging(&self) -> Result<TempDir> {
        fs::create_dir_all(self.staging_root).map_err(|e| {
            AppError::io(
                format!("Failed to create temp directory {}", self.staging_root.display()),
                e,
            )
        })?;

        let staging = tempfile::Builder::new()
            .prefix("gnome-ext-restore-")
            .tempdir_in(self.staging_root)
            .map_err(|e| AppError::io("Failed to create staging directory", e))?;

        tracing::debug!(path = %staging.path().display(), "Created staging directory");
        Ok(staging)
    }

    /// Apply staged contents to live state.
    fn apply(&self, staging: &Path) -> std::result::Result<RestoreProgress, RestoreFailure> {
        let mut progress = RestoreProgress::default();

        let staged_extensions = staging.join(EXTENSIONS_ENTRY);
        if is_real_dir(&staged_extensions) {
            let names = match staged_names(&staged_extensions) {
                Ok(names) => names,
                Err(error) => return Err(RestoreFailure { progress, error }),
            };

            for name in names {
                if let Err(error) = self
                    .repository
                    .replace_directory(&name, &staged_extensions.join(name.as_str()))
                {
                    tracing::warn!(
                        extension = %name,
                        restored = progress.restored.len(),
                        error = %error,
                        "Restore stopped"
                    );
                    return Err(RestoreFailure { progress, error });
                }
                progress.restored.push(name);
            }
        } else {
            tracing::info!("Archive contains no extensions");
        }

        let staged_settings = staging.join(SETTINGS_ENTRY);
        let applied = fs::read(&staged_settings)
            .map_err(|e| AppError::io("Failed to read staged settings", e))
            .and_then(|data| self.store.load(self.namespace, &data));
        if let Err(error) = applied {
            return Err(RestoreFailure { progress, error });
        }
        progress.settings_applied = true;

        tracing::info!(
            restored = progress.restored.len(),
            settings = progress.settings_applied,
            "Restore completed"
        );

        Ok(progress)
    }
}

/// Unpack every layout entry of `source` into `staging`.
fn extract(source: &Path, staging: &Path) -> Result<()> {
    let mut archive = open_archive(source)?;
    let mut count = 0usize;
    let mut has_settings = false;

    let entries = archive
        .entries()
        .map_err(|e| AppError::archive("Failed to read archive entries", e))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| AppError::archive("Failed to read archive entry", e))?;
        let path = entry
            .path()
            .map_err(|e| AppError::archive("Invalid path in archive entry", e))?
            .into_owned();

        let kind = classify(&path);
        if kind == EntryKind::Unknown {
            tracing::warn!(entry = %path.display(), "Ignoring entry outside backup layout");
            continue;
        }

        let entry_type = entry.header().entry_type();
        if (entry_type.is_symlink() || entry_type.is_hard_link()) && is_layout_anchor(&path) {
            return Err(AppError::ArchiveFormat {
                message: format!("Layout entry must not be a link: {}", path.display()),
                source: None,
            });
        }
        if kind == EntryKind::Settings {
            if !entry_type.is_file() {
                return Err(AppError::ArchiveFormat {
                    message: format!("{SETTINGS_ENTRY} is not a regular file"),
                    source: None,
                });
            }
            has_settings = true;
        }

        let unpacked = entry.unpack_in(staging).map_err(|e| {
            AppError::archive(format!("Failed to extract {}", path.display()), e)
        })?;
        if !unpacked {
            return Err(AppError::ArchiveFormat {
                message: format!("Entry escapes the archive root: {}", path.display()),
                source: None,
            });
        }
        count += 1;
    }

    if !has_settings {
        return Err(AppError::ArchiveFormat {
            message: format!("Archive has no {SETTINGS_ENTRY} entry"),
            source: None,
        });
    }

    tracing::debug!(entries = count, "Archive extracted to staging");
    Ok(())
}

fn is_real_dir(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.is_dir())
}

/// Sorted subdirectory names under the staged `extensions/` directory.
fn staged_names(dir: &Path) -> Result<Vec<ExtensionName>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| AppError::io("Failed to read staged extensions", e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AppError::io("Failed to read staged extensions", e))?;
        let path = entry.path();

        if !is_real_dir(&path) {
            tracing::warn!(entry = %path.display(), "Skipping non-directory under extensions/");
            continue;
        }

        match entry.file_name().to_str().map(ExtensionName::new) {
            Some(Ok(name)) => names.push(name),
            _ => tracing::warn!(entry = %path.display(), "Skipping invalid extension name"),
        }
    }

    names.sort();
    Ok(names)
}

fn open_archive(source: &Path) -> Result<Archive<GzDecoder<File>>> {
    if !source.is_file() {
        return Err(AppError::invalid(format!(
            "Backup archive not found: {}",
            source.display()
        )));
    }

    let file = File::open(source)
        .map_err(|e| AppError::io(format!("Failed to open {}", source.display()), e))?;

    Ok(Archive::new(GzDecoder::new(file)))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::application::archive_builder::ArchiveBuilder;
    use crate::domain::{ErrorKind, ExtensionSelection};
    use crate::infrastructure::testing::MemoryStore;

    const NS: &str = "/org/gnome/shell/extensions/";

    fn name(s: &str) -> ExtensionName {
        ExtensionName::new(s).unwrap()
    }

    /// Writes a tar.gz with the given (path, contents) file entries.
    fn write_archive(path: &Path, files: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut tar = tar::Builder::new(flate2::write::GzEncoder::new(
            file,
            flate2::Compression::default(),
        ));
        for (entry, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append_data(&mut header, entry, *data).unwrap();
        }
        tar.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(Path::new("settings.dconf")), EntryKind::Settings);
        assert_eq!(classify(Path::new("extensions")), EntryKind::ExtensionsRoot);
        assert_eq!(classify(Path::new("extensions/foo")), EntryKind::Extension("foo"));
        assert_eq!(
            classify(Path::new("./extensions/foo/a/b.js")),
            EntryKind::Extension("foo")
        );
        assert_eq!(classify(Path::new("other/file")), EntryKind::Unknown);
        assert_eq!(classify(Path::new("settings.dconf/x")), EntryKind::Unknown);
    }

    #[test]
    fn test_restore_replaces_and_loads_settings() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("b.tar.gz");
        write_archive(
            &archive,
            &[
                ("extensions/foo/extension.js", b"new"),
                ("extensions/bar/metadata.json", b"{}"),
                ("settings.dconf", b"X=1\n"),
            ],
        );

        let live = dir.path().join("live");
        fs::create_dir_all(live.join("foo")).unwrap();
        fs::write(live.join("foo/stale.js"), "old").unwrap();

        let staging_root = dir.path().join("tmp");
        let repo = ExtensionRepository::new(&live);
        let store = MemoryStore::default();

        let progress = ArchiveRestorer::new(&repo, &store, NS, &staging_root)
            .restore(&archive)
            .unwrap();

        assert_eq!(progress.restored, vec![name("bar"), name("foo")]);
        assert!(progress.settings_applied);
        assert!(!live.join("foo/stale.js").exists());
        assert_eq!(fs::read_to_string(live.join("foo/extension.js")).unwrap(), "new");
        assert_eq!(store.loads(), vec![(NS.to_string(), b"X=1\n".to_vec())]);
        assert_eq!(fs::read_dir(&staging_root).unwrap().count(), 0);
    }

    #[test]
    fn test_settings_only_archive() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("b.tar.gz");
        write_archive(&archive, &[("settings.dconf", b"Y=2\n")]);

        let live = dir.path().join("live");
        let repo = ExtensionRepository::new(&live);
        let store = MemoryStore::default();

        let progress = ArchiveRestorer::new(&repo, &store, NS, dir.path())
            .restore(&archive)
            .unwrap();

        assert!(progress.restored.is_empty());
        assert!(progress.settings_applied);
        assert!(!live.exists());
    }

    #[test]
    fn test_malformed_archive_is_format_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("junk.tar.gz");
        fs::write(&archive, "this is not a gzip stream").unwrap();

        let live = dir.path().join("live");
        fs::create_dir_all(live.join("foo")).unwrap();
        fs::write(live.join("foo/extension.js"), "keep").unwrap();

        let staging_root = dir.path().join("tmp");
        let repo = ExtensionRepository::new(&live);
        let store = MemoryStore::default();

        let failure = ArchiveRestorer::new(&repo, &store, NS, &staging_root)
            .restore(&archive)
            .unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::ArchiveFormat);
        assert!(failure.progress.restored.is_empty());
        assert_eq!(fs::read_to_string(live.join("foo/extension.js")).unwrap(), "keep");
        assert!(store.loads().is_empty());
        assert_eq!(fs::read_dir(&staging_root).unwrap().count(), 0);
    }

    #[test]
    fn test_settings_failure_keeps_restored_extensions() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("b.tar.gz");
        write_archive(
            &archive,
            &[
                ("extensions/foo/extension.js", b"new"),
                ("settings.dconf", b"X=1\n"),
            ],
        );

        let live = dir.path().join("live");
        let repo = ExtensionRepository::new(&live);
        let store = MemoryStore::failing_load();

        let failure = ArchiveRestorer::new(&repo, &store, NS, dir.path())
            .restore(&archive)
            .unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::ExternalTool);
        assert_eq!(failure.progress.restored, vec![name("foo")]);
        assert!(!failure.progress.settings_applied);
        assert!(live.join("foo/extension.js").is_file());
    }

    #[test]
    fn test_unknown_entries_are_ignored() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("b.tar.gz");
        write_archive(
            &archive,
            &[
                ("README", b"hello"),
                ("extensions/loose-file", b"x"),
                ("extensions/foo/extension.js", b"js"),
                ("settings.dconf", b""),
            ],
        );

        let staging_root = dir.path().join("tmp");
        let live = dir.path().join("live");
        let repo = ExtensionRepository::new(&live);
        let store = MemoryStore::default();

        let progress = ArchiveRestorer::new(&repo, &store, NS, &staging_root)
            .restore(&archive)
            .unwrap();

        assert_eq!(progress.restored, vec![name("foo")]);
        assert!(progress.settings_applied);
        assert!(!live.join("loose-file").exists());
    }

    #[test]
    fn test_missing_source_is_invalid_input() {
        let dir = tempdir().unwrap();
        let repo = ExtensionRepository::new(dir.path().join("live"));
        let store = MemoryStore::default();

        let failure = ArchiveRestorer::new(&repo, &store, NS, dir.path())
            .restore(&dir.path().join("missing.tar.gz"))
            .unwrap_err();
        assert_eq!(failure.error.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_inspect_built_archive() {
        let dir = tempdir().unwrap();
        let live = dir.path().join("live");
        fs::create_dir_all(live.join("foo")).unwrap();
        fs::write(live.join("foo/extension.js"), "js").unwrap();
        fs::create_dir_all(live.join("bar")).unwrap();

        let repo = ExtensionRepository::new(&live);
        let store = MemoryStore::with_dump(b"X=1\n");
        let archive = dir.path().join("b.tar.gz");
        let selection: ExtensionSelection = [name("foo"), name("bar")].into_iter().collect();
        ArchiveBuilder::new(&repo, &store, NS)
            .build(&archive, &selection, false)
            .unwrap();

        let summary = ArchiveRestorer::inspect(&archive).unwrap();
        assert_eq!(summary.extensions, vec![name("bar"), name("foo")]);
        assert!(summary.has_settings);
        assert!(summary.entry_count >= 4);
    }

    /// Appends a symlink entry at `path` pointing to `target`.
    fn append_symlink<W: std::io::Write>(tar: &mut tar::Builder<W>, path: &str, target: &Path) {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        tar.append_link(&mut header, path, target).unwrap();
    }

    fn append_file<W: std::io::Write>(tar: &mut tar::Builder<W>, path: &str, data: &[u8]) {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        tar.append_data(&mut header, path, data).unwrap();
    }

    #[test]
    fn test_symlinked_extensions_root_is_rejected() {
        let dir = tempdir().unwrap();
        let live = dir.path().join("live");
        fs::create_dir_all(live.join("foo")).unwrap();
        fs::write(live.join("foo/extension.js"), "keep").unwrap();

        let archive = dir.path().join("b.tar.gz");
        let mut tar = tar::Builder::new(flate2::write::GzEncoder::new(
            File::create(&archive).unwrap(),
            flate2::Compression::default(),
        ));
        append_symlink(&mut tar, "extensions", &live);
        append_file(&mut tar, "settings.dconf", b"X=1\n");
        tar.into_inner().unwrap().finish().unwrap();

        let staging_root = dir.path().join("tmp");
        let repo = ExtensionRepository::new(&live);
        let store = MemoryStore::default();

        let failure = ArchiveRestorer::new(&repo, &store, NS, &staging_root)
            .restore(&archive)
            .unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::ArchiveFormat);
        assert!(failure.progress.restored.is_empty());
        assert_eq!(fs::read_to_string(live.join("foo/extension.js")).unwrap(), "keep");
        assert!(store.loads().is_empty());
        assert_eq!(fs::read_dir(&staging_root).unwrap().count(), 0);
    }

    #[test]
    fn test_symlinked_settings_is_rejected() {
        let dir = tempdir().unwrap();
        let secret = dir.path().join("secret");
        fs::write(&secret, "not settings").unwrap();

        let archive = dir.path().join("b.tar.gz");
        let mut tar = tar::Builder::new(flate2::write::GzEncoder::new(
            File::create(&archive).unwrap(),
            flate2::Compression::default(),
        ));
        append_file(&mut tar, "extensions/foo/extension.js", b"js");
        append_symlink(&mut tar, "settings.dconf", &secret);
        tar.into_inner().unwrap().finish().unwrap();

        let live = dir.path().join("live");
        let repo = ExtensionRepository::new(&live);
        let store = MemoryStore::default();

        let failure = ArchiveRestorer::new(&repo, &store, NS, dir.path())
            .restore(&archive)
            .unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::ArchiveFormat);
        assert!(!live.exists());
        assert!(store.loads().is_empty());
    }

    #[test]
    fn test_archive_without_settings_is_rejected() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("foreign.tar.gz");
        write_archive(&archive, &[("src/main.rs", b"fn main() {}")]);

        let live = dir.path().join("live");
        let repo = ExtensionRepository::new(&live);
        let store = MemoryStore::default();

        let failure = ArchiveRestorer::new(&repo, &store, NS, dir.path())
            .restore(&archive)
            .unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::ArchiveFormat);
        assert!(!live.exists());
        assert!(store.loads().is_empty());
    }

    #[test]
    fn test_replace_failure_stops_after_applied_extensions() {
        let dir = tempdir().unwrap();

        // A live root deep enough that only the long paths inside `bbb`
        // exceed the platform path limit, while staging stays short.
        let mut live = dir.path().join("live");
        for _ in 0..19 {
            live.push("d".repeat(200));
        }
        fs::create_dir_all(&live).unwrap();

        let long = format!("extensions/bbb/{}/{}/x.js", "f".repeat(250), "g".repeat(250));
        let archive = dir.path().join("b.tar.gz");
        write_archive(
            &archive,
            &[
                ("extensions/aaa/extension.js", b"first"),
                (long.as_str(), b"second"),
                ("settings.dconf", b"X=1\n"),
            ],
        );

        let staging_root = dir.path().join("tmp");
        let repo = ExtensionRepository::new(&live);
        let store = MemoryStore::default();

        let failure = ArchiveRestorer::new(&repo, &store, NS, &staging_root)
            .restore(&archive)
            .unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::Io);
        assert_eq!(failure.progress.restored, vec![name("aaa")]);
        assert!(!failure.progress.settings_applied);
        assert_eq!(fs::read_to_string(live.join("aaa/extension.js")).unwrap(), "first");
        assert!(store.loads().is_empty());
        assert_eq!(fs::read_dir(&staging_root).unwrap().count(), 0);
    }
}
