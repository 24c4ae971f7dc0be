//! Infrastructure layer - external adapters (filesystem, dconf, config file).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod config;
pub mod dconf;
pub mod extension_repository;
pub mod gnome_paths;
#[cfg(test)]
pub mod testing;

pub use config::{ensure_config_exists, load_config, render_config};
pub use dconf::{ConfigStore, DconfCli};
pub use extension_repository::ExtensionRepository;
pub use gnome_paths::{config_file_path, resolve_extensions_dir};
