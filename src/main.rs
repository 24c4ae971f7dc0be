//! GNOME Extensions Backup - save and restore GNOME Shell extensions.
//!
//! Packs selected extension directories and their dconf settings into a
//! single `.tar.gz` archive, and restores such archives over the local
//! extension directory.
//!
//! QUICK START:
//!   gnome-ext-backup list                       # Installed extensions
//!   gnome-ext-backup backup --all               # Everything, auto-named archive
//!   gnome-ext-backup backup foo@x -o b.tar.gz   # Selected extensions
//!   gnome-ext-backup inspect b.tar.gz           # What an archive holds
//!   gnome-ext-backup restore b.tar.gz           # Replace extensions + load settings

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    format_archive_summary, format_backup_result, format_extensions_plain,
    format_extensions_table, format_json, format_restore_result, format_selection_counter,
    ArchiveRestorer, BackupOrchestrator, OutputFormat,
};
use cli::{Cli, Commands, ConfigAction};
use domain::{AppConfig, ExtensionName, ExtensionSelection, StatusEvent};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Main application logic. Returns whether the command succeeded.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(infrastructure::config_file_path);
    let config = infrastructure::load_config(Some(&config_path))
        .with_context(|| format!("loading {}", config_path.display()))?;

    match cli.command {
        Commands::List { format } => cmd_list(&config, &format),
        Commands::Backup {
            names,
            all,
            output,
            force,
        } => cmd_backup(&config, &names, all, output, force).await,
        Commands::Restore { archive } => Ok(cmd_restore(&config, archive).await),
        Commands::Inspect { archive } => cmd_inspect(&archive),
        Commands::Paths => {
            cmd_paths(&config, &config_path);
            Ok(true)
        }
        Commands::Config { action } => cmd_config(&config, &config_path, &action),
    }
}

/// List installed extensions.
fn cmd_list(config: &AppConfig, format: &str) -> anyhow::Result<bool> {
    let format = cli::parse_format(format).map_err(anyhow::Error::msg)?;
    let orchestrator = BackupOrchestrator::from_config(config);
    let names = orchestrator.list_extensions()?;

    let output = match format {
        OutputFormat::Table => format_extensions_table(&names),
        OutputFormat::Json => format_json(&names)?,
        OutputFormat::Plain => format_extensions_plain(&names),
    };
    println!("{output}");

    Ok(true)
}

/// Back up the named (or all) extensions.
async fn cmd_backup(
    config: &AppConfig,
    names: &[String],
    all: bool,
    output: Option<PathBuf>,
    force: bool,
) -> anyhow::Result<bool> {
    let orchestrator = BackupOrchestrator::from_config(config);
    let installed = orchestrator.list_extensions()?;

    let selection: ExtensionSelection = if all {
        installed.iter().cloned().collect()
    } else {
        names
            .iter()
            .map(|n| n.parse::<ExtensionName>())
            .collect::<Result<_, _>>()?
    };

    println!("{}", format_selection_counter(selection.len(), installed.len()));

    let destination = output.unwrap_or_else(|| {
        config
            .backup_dir()
            .join(config.backup_file_name(chrono::Local::now()))
    });

    let reporter = spawn_status_reporter(orchestrator.subscribe());
    let result = orchestrator
        .run_backup(selection, destination, force || config.backup.overwrite)
        .await;
    drop(orchestrator);
    finish_reporter(reporter).await;

    println!("{}", format_backup_result(&result));
    Ok(result.success)
}

/// Restore an archive over the extensions directory.
async fn cmd_restore(config: &AppConfig, archive: PathBuf) -> bool {
    let orchestrator = BackupOrchestrator::from_config(config);

    let reporter = spawn_status_reporter(orchestrator.subscribe());
    let result = orchestrator.run_restore(archive).await;
    drop(orchestrator);
    finish_reporter(reporter).await;

    println!("{}", format_restore_result(&result));
    result.success
}

/// Show archive contents.
fn cmd_inspect(archive: &std::path::Path) -> anyhow::Result<bool> {
    let summary = ArchiveRestorer::inspect(archive)?;
    println!("{}", format_archive_summary(&summary));
    Ok(true)
}

/// Show paths in use.
fn cmd_paths(config: &AppConfig, config_path: &std::path::Path) {
    println!("{}", "📂 GNOME Extensions Backup Paths".bold());
    println!();
    println!("  Extensions:  {}", infrastructure::resolve_extensions_dir(config).display());
    println!("  Staging:     {}", config.temp_dir().display());
    println!("  Backups:     {}", config.backup_dir().display());
    println!("  Config file: {}", config_path.display());
    println!(
        "  Settings:    {} {}",
        config.settings.command.cyan(),
        config.settings.namespace
    );
}

/// Configuration file commands.
fn cmd_config(
    config: &AppConfig,
    config_path: &std::path::Path,
    action: &ConfigAction,
) -> anyhow::Result<bool> {
    match action {
        ConfigAction::Init => {
            if infrastructure::ensure_config_exists(config_path)? {
                println!("{} Created {}", "✓".green().bold(), config_path.display());
            } else {
                println!("Config already exists: {}", config_path.display());
            }
        }
        ConfigAction::Show => {
            print!("{}", infrastructure::render_config(config)?);
        }
    }
    Ok(true)
}

/// Wait for the status reporter to drain its channel.
async fn finish_reporter(reporter: tokio::task::JoinHandle<()>) {
    if let Err(e) = reporter.await {
        tracing::warn!(error = %e, "Status reporter stopped abnormally");
    }
}

/// Print coarse status events until the orchestrator is dropped.
fn spawn_status_reporter(
    mut events: broadcast::Receiver<StatusEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(StatusEvent::Started(operation)) => {
                    println!("{} Running {operation}...", "⏳".bold());
                }
                Ok(event) => tracing::debug!(?event, "Status"),
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
