//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::OutputFormat;

/// GNOME Extensions Backup - back up and restore GNOME Shell extensions
/// together with their dconf settings.
#[derive(Parser, Debug)]
#[command(name = "gnome-ext-backup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Use this configuration file instead of the default one.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List installed extensions.
    List {
        /// Output format: table, json, or plain.
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Back up extensions and their settings into a .tar.gz archive.
    Backup {
        /// Extensions to back up (directory names).
        names: Vec<String>,

        /// Back up every installed extension.
        #[arg(short, long, conflicts_with = "names")]
        all: bool,

        /// Archive path (auto-named in the backup directory if omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite the archive if it already exists.
        #[arg(long)]
        force: bool,
    },

    /// Restore extensions and settings from a backup archive.
    ///
    /// Existing extensions with the same name are replaced entirely.
    Restore {
        /// Backup archive (.tar.gz).
        archive: PathBuf,
    },

    /// Show what a backup archive contains without restoring it.
    Inspect {
        /// Backup archive (.tar.gz).
        archive: PathBuf,
    },

    /// Show the paths and settings namespace being used.
    Paths,

    /// Manage the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default configuration file if none exists.
    Init,
    /// Print the effective configuration.
    Show,
}

/// Parse an output format argument.
pub fn parse_format(format: &str) -> Result<OutputFormat, String> {
    format.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_names_and_flags() {
        let cli = Cli::parse_from([
            "gnome-ext-backup",
            "backup",
            "foo",
            "bar",
            "-o",
            "/tmp/b.tar.gz",
            "--force",
        ]);
        match cli.command {
            Commands::Backup {
                names,
                all,
                output,
                force,
            } => {
                assert_eq!(names, vec!["foo", "bar"]);
                assert!(!all);
                assert_eq!(output, Some(PathBuf::from("/tmp/b.tar.gz")));
                assert!(force);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_all_conflicts_with_names() {
        assert!(Cli::try_parse_from(["gnome-ext-backup", "backup", "--all", "foo"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["gnome-ext-backup", "restore", "b.tar.gz", "-vv"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Restore { .. }));
    }
}
