//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::query::DEFAULT_PAGE_THRESHOLD;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub druid: DruidConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Druid broker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DruidConfig {
    /// Query endpoint, e.g. `http://localhost:8082/druid/v2/`
    #[serde(default = "default_url")]
    pub url: String,

    /// Data source queried when none is given
    #[serde(default)]
    pub data_source: String,

    /// Rows per page for select queries
    #[serde(default = "default_page_threshold")]
    pub page_threshold: usize,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_url() -> String {
    "http://localhost:8082/druid/v2/".to_string()
}

fn default_page_threshold() -> usize {
    DEFAULT_PAGE_THRESHOLD
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

impl Default for DruidConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            data_source: String::new(),
            page_threshold: default_page_threshold(),
            request_timeout_ms: default_request_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("claw-druid").join("config.toml")),
            Some(PathBuf::from("/etc/claw-druid/config.toml")),
            Some(PathBuf::from("./claw-druid.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CLAW_DRUID_URL") {
            self.druid.url = url;
        }
        if let Some(source) = lookup("CLAW_DRUID_DATA_SOURCE") {
            self.druid.data_source = source;
        }
        if let Some(threshold) = lookup("CLAW_DRUID_PAGE_THRESHOLD") {
            match threshold.parse() {
                Ok(t) => self.druid.page_threshold = t,
                Err(_) => tracing::warn!(value = %threshold, "ignoring invalid CLAW_DRUID_PAGE_THRESHOLD"),
            }
        }
        if let Some(timeout) = lookup("CLAW_DRUID_TIMEOUT_MS") {
            match timeout.parse() {
                Ok(t) => self.druid.request_timeout_ms = t,
                Err(_) => tracing::warn!(value = %timeout, "ignoring invalid CLAW_DRUID_TIMEOUT_MS"),
            }
        }

        if let Some(level) = lookup("CLAW_DRUID_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("CLAW_DRUID_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# claw-druid Configuration
#
# Environment variables override these settings:
# - CLAW_DRUID_URL
# - CLAW_DRUID_DATA_SOURCE
# - CLAW_DRUID_PAGE_THRESHOLD
# - CLAW_DRUID_TIMEOUT_MS
# - CLAW_DRUID_LOG_LEVEL
# - CLAW_DRUID_LOG_FORMAT

[druid]
# Broker query endpoint
url = "http://localhost:8082/druid/v2/"

# Default data source
data_source = ""

# Rows per page for select queries
page_threshold = 1000

# Request timeout in milliseconds
request_timeout_ms = 30000

# Attempts for connection failures and rate limiting
max_retries = 3

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
