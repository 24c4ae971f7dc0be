//! Backup and restore orchestration.
//!
//! Owns the collaborators, runs each operation on a blocking worker so the
//! caller's event loop stays responsive, and turns every failure into a
//! result record.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::domain::{
    AppConfig, AppError, BackupResult, ExtensionName, ExtensionSelection, OperationKind,
    RestoreResult, Result, StatusEvent,
};
use crate::infrastructure::{resolve_extensions_dir, ConfigStore, DconfCli, ExtensionRepository};

use super::archive_builder::ArchiveBuilder;
use super::archive_restorer::{ArchiveRestorer, RestoreFailure, RestoreProgress};

const STATUS_CHANNEL_CAPACITY: usize = 16;

/// Marks an operation as running; cleared on drop.
struct RunningGuard(Arc<AtomicBool>);

impl RunningGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppError::OperationInProgress)?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Collaborators shared with the worker thread.
#[derive(Clone)]
struct Pipeline {
    repository: ExtensionRepository,
    store: Arc<dyn ConfigStore>,
    namespace: String,
    staging_root: PathBuf,
}

impl Pipeline {
    fn backup(
        &self,
        selection: &ExtensionSelection,
        destination: &Path,
        overwrite: bool,
    ) -> Result<BackupResult> {
        if selection.is_empty() {
            return Err(AppError::invalid("select at least one extension"));
        }

        let summary = ArchiveBuilder::new(&self.repository, self.store.as_ref(), &self.namespace)
            .build(destination, selection, overwrite)?;

        Ok(BackupResult {
            success: true,
            count: summary.added.len(),
            archive_path: destination.to_path_buf(),
            extensions: summary.added,
            skipped: summary.skipped,
            error: None,
        })
    }

    fn restore(&self, source: &Path) -> std::result::Result<RestoreProgress, RestoreFailure> {
        ArchiveRestorer::new(
            &self.repository,
            self.store.as_ref(),
            &self.namespace,
            &self.staging_root,
        )
        .restore(source)
    }
}

/// Entry point for the two top-level operations.
///
/// At most one backup or restore runs at a time; a second request while one
/// is in flight fails immediately with a busy error.
pub struct BackupOrchestrator {
    pipeline: Pipeline,
    running: Arc<AtomicBool>,
    events: broadcast::Sender<StatusEvent>,
}

impl BackupOrchestrator {
    /// Create an orchestrator over explicit collaborators.
    #[must_use]
    pub fn new(
        repository: ExtensionRepository,
        store: Arc<dyn ConfigStore>,
        namespace: impl Into<String>,
        staging_root: impl Into<PathBuf>,
    ) -> Self {
        let (events, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            pipeline: Pipeline {
                repository,
                store,
                namespace: namespace.into(),
                staging_root: staging_root.into(),
            },
            running: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    /// Create an orchestrator wired to `dconf` and the configured paths.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            ExtensionRepository::new(resolve_extensions_dir(config)),
            Arc::new(DconfCli::new(config.settings.command.clone())),
            config.settings.namespace.clone(),
            config.temp_dir(),
        )
    }

    /// Receive coarse status notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    /// Whether an operation is currently in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// List installed extensions, sorted by name.
    ///
    /// # Errors
    /// Returns error if the extensions directory cannot be read.
    pub fn list_extensions(&self) -> Result<Vec<ExtensionName>> {
        self.pipeline.repository.list_extensions()
    }

    fn notify(&self, event: StatusEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn finish(&self, operation: OperationKind, outcome: std::result::Result<usize, String>) {
        match outcome {
            Ok(count) => self.notify(StatusEvent::Succeeded { operation, count }),
            Err(message) => self.notify(StatusEvent::Failed { operation, message }),
        }
    }

    /// Back up `selection` into a new archive at `destination`.
    pub async fn run_backup(
        &self,
        selection: ExtensionSelection,
        destination: PathBuf,
        overwrite: bool,
    ) -> BackupResult {
        let guard = match RunningGuard::acquire(&self.running) {
            Ok(guard) => guard,
            Err(e) => return BackupResult::failed(destination, &e),
        };

        tracing::info!(
            selected = selection.len(),
            path = %destination.display(),
            "Starting backup"
        );
        self.notify(StatusEvent::Started(OperationKind::Backup));

        let pipeline = self.pipeline.clone();
        let target = destination.clone();
        // The worker owns the guard so the flag outlives a dropped caller.
        let joined = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            pipeline.backup(&selection, &target, overwrite)
        })
        .await;

        let result = match joined {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Backup failed");
                BackupResult::failed(destination, &e)
            }
            Err(e) => {
                tracing::error!(error = %e, "Backup task panicked");
                BackupResult::failed(
                    destination,
                    &AppError::Io {
                        message: format!("backup worker stopped: {e}"),
                        source: None,
                    },
                )
            }
        };

        self.finish(
            OperationKind::Backup,
            if result.success {
                Ok(result.count)
            } else {
                Err(result.error.as_ref().map(ToString::to_string).unwrap_or_default())
            },
        );

        result
    }

    /// Restore extensions and settings from the archive at `source`.
    ///
    /// A successful restore also publishes [`StatusEvent::ExtensionsChanged`].
    pub async fn run_restore(&self, source: PathBuf) -> RestoreResult {
        let guard = match RunningGuard::acquire(&self.running) {
            Ok(guard) => guard,
            Err(e) => return failed_restore(RestoreProgress::default(), &e),
        };

        tracing::info!(path = %source.display(), "Starting restore");
        self.notify(StatusEvent::Started(OperationKind::Restore));

        let pipeline = self.pipeline.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            pipeline.restore(&source)
        })
        .await;

        let result = match joined {
            Ok(Ok(progress)) => RestoreResult {
                success: true,
                count: progress.restored.len(),
                listing_stale: true,
                restored: progress.restored,
                settings_applied: progress.settings_applied,
                error: None,
            },
            Ok(Err(failure)) => {
                tracing::error!(
                    error = %failure.error,
                    restored = failure.progress.restored.len(),
                    "Restore failed"
                );
                failed_restore(failure.progress, &failure.error)
            }
            Err(e) => {
                tracing::error!(error = %e, "Restore task panicked");
                failed_restore(
                    RestoreProgress::default(),
                    &AppError::Io {
                        message: format!("restore worker stopped: {e}"),
                        source: None,
                    },
                )
            }
        };

        self.finish(
            OperationKind::Restore,
            if result.success {
                Ok(result.count)
            } else {
                Err(result.error.as_ref().map(ToString::to_string).unwrap_or_default())
            },
        );
        if result.listing_stale {
            self.notify(StatusEvent::ExtensionsChanged);
        }

        result
    }
}

fn failed_restore(progress: RestoreProgress, err: &AppError) -> RestoreResult {
    RestoreResult {
        success: false,
        count: progress.restored.len(),
        listing_stale: !progress.restored.is_empty(),
        restored: progress.restored,
        settings_applied: progress.settings_applied,
        error: Some(err.into()),
    }
}
