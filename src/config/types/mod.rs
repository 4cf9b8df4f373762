//! Configuration types module
//!
//! Top-level `Config` plus the search and logging sections; storage, cache
//! and provider sections live in their own modules.

pub mod cache;
pub mod provider;
pub mod storage;

use serde::{Deserialize, Serialize};

use crate::core::types::{DEFAULT_SIMILARITY_LIMIT, DEFAULT_SIMILARITY_THRESHOLD};
use crate::core::SearchOptions;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// PostgreSQL embedding store
    #[serde(default)]
    pub database: storage::DatabaseConfig,

    /// Key/value cache
    #[serde(default)]
    pub cache: cache::CacheConfig,

    /// Vector / completion provider
    #[serde(default)]
    pub provider: provider::ProviderConfig,

    /// Similarity search defaults
    #[serde(default)]
    pub search: SearchConfig,

    /// Logging
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from environment variables and files
    ///
    /// Layers, lowest precedence first:
    /// 1. Default values
    /// 2. Config file (if present)
    /// 3. Environment variable overrides
    pub fn from_env() -> crate::error::Result<Self> {
        crate::config::load_config()
    }
}

/// Defaults applied when a similarity search omits limit or threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum results
    #[serde(default = "default_search_limit")]
    pub limit: usize,
    /// Exclusive minimum similarity
    #[serde(default = "default_search_threshold")]
    pub threshold: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            limit: default_search_limit(),
            threshold: default_search_threshold(),
        }
    }
}

impl SearchConfig {
    /// Resolve caller-supplied overrides against the defaults
    pub fn options(&self, limit: Option<usize>, threshold: Option<f64>) -> SearchOptions {
        SearchOptions::new(
            limit.unwrap_or(self.limit),
            threshold.unwrap_or(self.threshold),
        )
    }
}

fn default_search_limit() -> usize {
    DEFAULT_SIMILARITY_LIMIT
}

fn default_search_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(crate::error::Error::Config(format!(
                "Invalid log format: {}. Valid options: pretty, json",
                s
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level filter
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info,memstore=debug".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_defaults() {
        let search = SearchConfig::default();
        let options = search.options(None, None);
        assert_eq!(options.limit, 10);
        assert_eq!(options.threshold, 0.8);

        let options = search.options(Some(3), Some(0.5));
        assert_eq!(options.limit, 3);
        assert_eq!(options.threshold, 0.5);
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_config_from_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.search.limit, 10);
        assert_eq!(config.log.format, LogFormat::Pretty);
    }
}
