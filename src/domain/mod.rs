//! Domain layer - core types and errors.
//!
//! This layer contains pure domain models, configuration and error types
//! without any IO.

pub mod config;
pub mod error;
pub mod models;

pub use config::AppConfig;
pub use error::{AppError, ErrorKind, Result};
pub use models::{
    extension_entry, ArchiveSummary, BackupResult, ExtensionName, ExtensionSelection,
    OperationKind, RestoreResult, StatusEvent, EXTENSIONS_ENTRY, SETTINGS_ENTRY,
};
