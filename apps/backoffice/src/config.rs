//! Back office configuration module.
//!
//! ## Sources (later wins)
//! 1. Defaults (this file)
//! 2. Config file (`tradeflow.toml`, optional)
//! 3. Environment variables (`TRADEFLOW_*`)
//!
//! ```text
//! TRADEFLOW_DATABASE_PATH=./data/tradeflow.db
//! TRADEFLOW_MAX_CONNECTIONS=8
//! TRADEFLOW_DEFAULT_PAGE_SIZE=25
//! TRADEFLOW_MAX_PAGE_SIZE=200
//! TRADEFLOW_LOG_FILTER=info,tradeflow_db=debug
//! ```

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use tradeflow_core::PageRequest;
use tradeflow_db::DbConfig;

/// Config file looked up next to the working directory (any supported extension).
pub const DEFAULT_CONFIG_FILE: &str = "tradeflow";

/// Back office configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file
    pub database_path: String,

    /// Pool size
    pub max_connections: u32,

    /// Page size when a listing does not ask for one
    pub default_page_size: u32,

    /// Upper bound on any requested page size
    pub max_page_size: u32,

    /// `tracing` filter used when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: "./tradeflow.db".to_string(),
            max_connections: 5,
            default_page_size: tradeflow_core::DEFAULT_PAGE_SIZE,
            max_page_size: 100,
            log_filter: "info,sqlx=warn".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `tradeflow.toml` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Loads configuration using `file` as the optional config file.
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let settings = defaults()?
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix("TRADEFLOW").try_parsing(true))
            .build()?;

        Self::from_settings(settings)
    }

    fn from_settings(settings: Config) -> Result<Self, ConfigError> {
        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that deserialization cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::MissingRequired("database_path".to_string()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.max_page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "max_page_size must be at least 1".to_string(),
            ));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::InvalidValue(format!(
                "default_page_size must be between 1 and max_page_size ({})",
                self.max_page_size
            )));
        }
        Ok(())
    }

    /// Pool settings for this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path).max_connections(self.max_connections)
    }

    /// Resolves a caller's page request against the configured sizes.
    pub fn page(&self, page: Option<u32>, per_page: Option<u32>) -> PageRequest {
        PageRequest::new(
            page.unwrap_or(1),
            per_page.unwrap_or(self.default_page_size),
        )
        .clamp(self.max_page_size)
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    let d = AppConfig::default();
    Config::builder()
        .set_default("database_path", d.database_path)?
        .set_default("max_connections", d.max_connections)?
        .set_default("default_page_size", d.default_page_size)?
        .set_default("max_page_size", d.max_page_size)?
        .set_default("log_filter", d.log_filter)
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Result<AppConfig, ConfigError> {
        let settings = defaults()
            .unwrap()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap();
        AppConfig::from_settings(settings)
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let config = from_toml(
            r#"
            database_path = "/var/lib/tradeflow/main.db"
            max_page_size = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.database_path, "/var/lib/tradeflow/main.db");
        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_rejects_default_page_above_max() {
        let err = from_toml("default_page_size = 500\nmax_page_size = 100").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_rejects_empty_database_path() {
        let err = from_toml("database_path = \"  \"").unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(_)));
    }

    #[test]
    fn test_page_is_clamped() {
        let config = AppConfig::default();
        assert_eq!(config.page(None, None).per_page(), config.default_page_size);
        assert_eq!(config.page(Some(3), Some(10_000)).per_page(), config.max_page_size);
        assert_eq!(config.page(Some(0), Some(5)).page, 1);
    }
}
