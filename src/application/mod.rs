//! Application layer - use cases and orchestration.
//!
//! This layer contains the backup and restore pipelines and the
//! orchestrator that drives them.

pub mod archive_builder;
pub mod archive_restorer;
pub mod formatter;
pub mod orchestrator;

pub use archive_restorer::ArchiveRestorer;
pub use formatter::{
    format_archive_summary, format_backup_result, format_extensions_plain,
    format_extensions_table, format_json, format_restore_result, format_selection_counter,
    OutputFormat,
};
pub use orchestrator::BackupOrchestrator;
