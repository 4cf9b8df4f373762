//! Configuration I/O - Loading and saving configuration
//!
//! Handles reading configuration from files and environment variables.

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;

use super::types::Config;
use crate::error::{Error, Result};

/// Load configuration with layered precedence:
/// 1. Config file (config.toml / config.json) if it exists, otherwise defaults
/// 2. Environment variable overrides (includes .env)
pub fn load_config() -> Result<Config> {
    let config_path = super::paths::config_path();

    let mut config = if config_path.exists() {
        load_config_from_path(&config_path)?
    } else {
        Config::default()
    };

    // Apply environment variable overrides (highest precedence)
    apply_env_overrides(&mut config);

    Ok(config)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    // Detect format by extension
    let config: Config = if path.extension().is_some_and(|ext| ext == "json") {
        // Parse as JSON5 (more lenient than strict JSON)
        json5::from_str(&content).map_err(|e| Error::Config(format!("Invalid JSON config: {}", e)))?
    } else if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&content).map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))?
    } else {
        // Try TOML first, then JSON5
        toml::from_str(&content)
            .or_else(|_| json5::from_str(&content).map_err(|e| Error::Config(e.to_string())))
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?
    };

    Ok(config)
}

/// Apply environment variable overrides to an existing config.
///
/// Loads the `.env` file first, then overlays any set variables.
pub fn apply_env_overrides(config: &mut Config) {
    dotenvy::dotenv().ok();
    apply_overrides(config, |key| std::env::var(key).ok());
}

/// Apply overrides from an arbitrary variable source
pub fn apply_overrides<F>(config: &mut Config, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    let parsed = |key: &str| var(key).and_then(|v| v.trim().parse::<u64>().ok());

    // Database overrides
    let db = &mut config.database;
    if let Some(url) = var("DATABASE_URL").filter(|v| !v.is_empty()) {
        db.url = Some(SecretString::from(url));
    }
    if let Some(host) = var("DATABASE_HOST") {
        db.host = host;
    }
    if let Some(port) = var("DATABASE_PORT").and_then(|v| v.parse().ok()) {
        db.port = port;
    }
    if let Some(username) = var("DATABASE_USERNAME") {
        db.username = username;
    }
    if let Some(password) = var("DATABASE_PASSWORD") {
        db.password = Some(SecretString::from(password));
    }
    if let Some(name) = var("DATABASE_NAME") {
        db.name = name;
    }
    if let Some(v) = var("DATABASE_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
        db.max_connections = v;
    }
    if let Some(secs) = parsed("DATABASE_TIMEOUT") {
        db.connect_timeout = Duration::from_secs(secs);
    }
    if let Some(dims) = var("EMBEDDING_DIMENSIONS").and_then(|v| v.parse().ok()) {
        db.dimensions = Some(dims);
    }

    // Cache overrides
    let cache = &mut config.cache;
    if let Some(backend) = var("CACHE_BACKEND").and_then(|v| v.parse().ok()) {
        cache.backend = backend;
    }
    if let Some(host) = var("REDIS_HOST") {
        cache.redis.host = host;
    }
    if let Some(port) = var("REDIS_PORT").and_then(|v| v.parse().ok()) {
        cache.redis.port = port;
    }
    if let Some(password) = var("REDIS_PASSWORD").filter(|v| !v.is_empty()) {
        cache.redis.password = Some(SecretString::from(password));
    }
    if let Some(db) = var("REDIS_DB").and_then(|v| v.parse().ok()) {
        cache.redis.db = db;
    }
    if let Some(secs) = parsed("CACHE_VECTOR_TTL") {
        cache.vector_ttl = Duration::from_secs(secs);
    }

    // Provider overrides
    let provider = &mut config.provider;
    if let Some(kind) = var("EMBEDDING_PROVIDER").and_then(|v| v.parse().ok()) {
        provider.kind = kind;
    }
    if let Some(api_key) = var("OPENAI_API_KEY") {
        provider.openai.api_key = SecretString::from(api_key);
    }
    if let Some(url) = var("OPENAI_BASE_URL") {
        provider.openai.base_url = url;
    }
    if let Some(model) = var("OPENAI_MODEL") {
        provider.openai.completion_model = model;
    }
    if let Some(model) = var("OPENAI_EMBEDDING_MODEL") {
        provider.openai.embedding_model = model;
    }
    if let Some(model) = var("LOCAL_EMBEDDING_MODEL") {
        provider.local.model = model;
    }
    if let Some(retries) = var("PROVIDER_MAX_RETRIES").and_then(|v| v.parse().ok()) {
        provider.retry.max_retries = retries;
    }

    // Logging overrides
    if let Some(level) = var("RUST_LOG") {
        config.log.level = level;
    }
    if let Some(format) = var("LOG_FORMAT").and_then(|v| v.parse().ok()) {
        config.log.format = format;
    }
}

/// Save configuration to a file
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let content = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::to_string_pretty(config).map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    } else {
        toml::to_string_pretty(config).map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, content)?;
    Ok(())
}
