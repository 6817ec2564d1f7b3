//! Shroud CLI commands.

pub mod analyze;
pub mod check;
pub mod inspect;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use shroud_core::ShroudConfig;

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "shroud.yaml";

/// Load the configuration named on the command line, or `./shroud.yaml`
/// when it exists, or the defaults.
pub fn load_config(path: Option<&Path>) -> Result<ShroudConfig> {
    if let Some(path) = path {
        return ShroudConfig::load_with_context(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()));
    }

    let fallback = Path::new(DEFAULT_CONFIG_FILE);
    if fallback.exists() {
        return ShroudConfig::load_with_context(fallback)
            .with_context(|| format!("Failed to load configuration from {DEFAULT_CONFIG_FILE}"));
    }

    Ok(ShroudConfig::default())
}

/// Catalog file from the flag, else from the configuration.
pub fn catalog_path(config: &ShroudConfig, flag: Option<PathBuf>) -> Result<PathBuf> {
    flag.or_else(|| config.catalog_file.clone()).context(
        "No catalog file. Pass --catalog or set catalog_file in shroud.yaml.",
    )
}
