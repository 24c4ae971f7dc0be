//! Output formatting for listings and operation results.
//!
//! Supports table, JSON and plain one-per-line listings.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::domain::{ArchiveSummary, BackupResult, ExtensionName, RestoreResult};

/// Output format options.
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Boxed table.
    #[default]
    Table,
    /// JSON format for programmatic use.
    Json,
    /// One name per line.
    Plain,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "plain" | "text" => Ok(Self::Plain),
            _ => Err(format!("Unknown format: {s}. Use: table, json, plain")),
        }
    }
}

/// Formats the installed extension list.
pub fn format_extensions_table(names: &[ExtensionName]) -> String {
    if names.is_empty() {
        return "No extensions found".dimmed().to_string();
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Extension"]);

    for (i, name) in names.iter().enumerate() {
        table.add_row(vec![(i + 1).to_string(), name.to_string()]);
    }

    table.to_string()
}

/// Formats the installed extension list one name per line.
pub fn format_extensions_plain(names: &[ExtensionName]) -> String {
    names
        .iter()
        .map(ExtensionName::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serializes any result or listing as pretty JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// "N of M selected" summary shown before a backup.
pub fn format_selection_counter(selected: usize, total: usize) -> String {
    format!("📦 {selected} of {total} selected")
}

/// One-line backup outcome.
pub fn format_backup_result(result: &BackupResult) -> String {
    if result.success {
        let mut out = format!(
            "{} Backed up {} extension(s) to {}",
            "✓".green().bold(),
            result.count.to_string().cyan(),
            result.archive_path.display()
        );
        if !result.skipped.is_empty() {
            out.push_str(&format!(
                "\n  {} skipped (not installed): {}",
                "!".yellow(),
                join_names(&result.skipped)
            ));
        }
        out
    } else {
        format!(
            "{} Backup failed: {}",
            "✗".red().bold(),
            result
                .error
                .as_ref()
                .map_or_else(|| "unknown error".to_string(), ToString::to_string)
        )
    }
}

/// Restore outcome with the shell restart hint on success.
pub fn format_restore_result(result: &RestoreResult) -> String {
    if result.success {
        let mut out = format!(
            "{} Restored {} extension(s)",
            "✓".green().bold(),
            result.count.to_string().cyan()
        );
        if result.settings_applied {
            out.push_str(" and their settings");
        }
        out.push_str(&format!(
            "\n{} Restart GNOME Shell to apply the changes (Alt+F2, type 'r' on X11; log out and back in on Wayland)",
            "💡".bold()
        ));
        out
    } else {
        format!(
            "{} Restore failed after {} extension(s): {}",
            "✗".red().bold(),
            result.count,
            result
                .error
                .as_ref()
                .map_or_else(|| "unknown error".to_string(), ToString::to_string)
        )
    }
}

/// Archive contents for `inspect`.
pub fn format_archive_summary(summary: &ArchiveSummary) -> String {
    let mut out = format!(
        "{}\n  Entries: {}\n  Extensions: {}\n  Settings snapshot: {}",
        "🗄  Archive contents".bold(),
        summary.entry_count.to_string().cyan(),
        summary.extensions.len().to_string().cyan(),
        if summary.has_settings {
            "yes".green()
        } else {
            "no".yellow()
        }
    );
    for name in &summary.extensions {
        out.push_str(&format!("\n    - {name}"));
    }
    out
}

fn join_names(names: &[ExtensionName]) -> String {
    names
        .iter()
        .map(ExtensionName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
