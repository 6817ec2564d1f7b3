//! Configuration types for Shroud.
//!
//! Configuration is loaded from a YAML file (`shroud.yaml`) that names the
//! dialect, the current database and the catalog file, and tunes the
//! analysis. Command-line flags override individual values.
//!
//! # Example
//!
//! ```yaml
//! project: billing
//! dialect: postgres
//! current_database: billing
//! catalog_file: catalog.yaml
//! analysis:
//!   max_depth: 64
//!   ambiguity: strict
//! ```

pub mod analysis;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use analysis::{AmbiguityMode, AnalysisConfig};

use crate::catalog::{CaseSensitivity, CatalogSource, FileCatalogSource, SchemaCatalog};
use crate::dialect::Dialect;

/// Complete Shroud configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShroudConfig {
    /// Project name.
    #[serde(default)]
    pub project: Option<String>,

    /// Dialect family of analyzed statements.
    #[serde(default = "default_dialect")]
    pub dialect: Dialect,

    /// Database used when a table reference has no database qualifier.
    /// Empty searches every database of the catalog.
    #[serde(default)]
    pub current_database: String,

    /// Path to the catalog file (JSON or YAML).
    #[serde(default)]
    pub catalog_file: Option<PathBuf>,

    /// Identifier comparison. Defaults to the dialect's convention.
    #[serde(default)]
    pub case_sensitivity: Option<CaseSensitivity>,

    /// Engine limits and resolution policy.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ShroudConfig {
    fn default() -> Self {
        Self {
            project: None,
            dialect: default_dialect(),
            current_database: String::new(),
            catalog_file: None,
            case_sensitivity: None,
            analysis: AnalysisConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_dialect() -> Dialect {
    Dialect::Postgres
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration and catalog loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShroudConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration and resolve `catalog_file` against the
    /// configuration file's directory.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(catalog_file) = &config.catalog_file
            && !catalog_file.is_absolute()
        {
            config.catalog_file = Some(base_dir.join(catalog_file));
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.max_depth == 0 {
            return Err(ConfigError::Config(
                "analysis.max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Identifier comparison in effect: the explicit setting or the dialect default.
    pub fn effective_case_sensitivity(&self) -> CaseSensitivity {
        self.case_sensitivity
            .unwrap_or_else(|| self.dialect.default_case_sensitivity())
    }

    /// Load the configured catalog file for `current_database`.
    pub fn load_catalog(&self) -> Result<SchemaCatalog, ConfigError> {
        let path = self
            .catalog_file
            .as_ref()
            .ok_or_else(|| ConfigError::Config("no catalog_file configured".to_string()))?;
        FileCatalogSource::new(path)
            .load_catalog(&self.current_database, self.effective_case_sensitivity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ShroudConfig::from_yaml("project: demo").unwrap();
        assert_eq!(config.project.as_deref(), Some("demo"));
        assert_eq!(config.dialect, Dialect::Postgres);
        assert_eq!(config.analysis.max_depth, 64);
        assert_eq!(config.analysis.ambiguity, AmbiguityMode::FirstMatch);
        assert!(config.analysis.skip_system_schemas);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_effective_case_sensitivity() {
        let mut config = ShroudConfig::from_yaml("dialect: mysql").unwrap();
        assert_eq!(
            config.effective_case_sensitivity(),
            CaseSensitivity::Insensitive
        );
        config.case_sensitivity = Some(CaseSensitivity::Sensitive);
        assert_eq!(config.effective_case_sensitivity(), CaseSensitivity::Sensitive);
    }

    #[test]
    fn test_load_with_context_resolves_catalog_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("shroud.yaml");
        std::fs::write(
            &config_path,
            "dialect: tsql\ncurrent_database: sales\ncatalog_file: catalog.yaml\nanalysis:\n  ambiguity: strict\n",
        )
        .unwrap();

        let config = ShroudConfig::load_with_context(&config_path).unwrap();
        assert_eq!(config.dialect, Dialect::TSql);
        assert_eq!(config.catalog_file, Some(dir.path().join("catalog.yaml")));
        assert_eq!(config.analysis.ambiguity, AmbiguityMode::Strict);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("shroud.yaml");
        std::fs::write(&config_path, "analysis:\n  max_depth: 0\n").unwrap();
        assert!(matches!(
            ShroudConfig::load_with_context(&config_path),
            Err(ConfigError::Config(_))
        ));
    }

    #[test]
    fn test_load_catalog_requires_file() {
        let config = ShroudConfig::default();
        assert!(matches!(config.load_catalog(), Err(ConfigError::Config(_))));
    }
}
