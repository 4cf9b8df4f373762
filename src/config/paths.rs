//! Configuration paths
//!
//! Utilities for resolving configuration file paths.

use std::path::PathBuf;

/// Get the configuration directory
pub fn config_dir() -> PathBuf {
    // Check for explicit override
    if let Ok(dir) = std::env::var("MEMSTORE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    // Use XDG config directory or fallback
    dirs::config_dir()
        .map(|d| d.join("memstore"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".config").join("memstore"))
                .unwrap_or_else(|| PathBuf::from(".memstore"))
        })
}

/// Get the main configuration file path.
///
/// `MEMSTORE_CONFIG` wins; otherwise `config.toml` in the config dir, or
/// `config.json` when only that one exists.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("MEMSTORE_CONFIG") {
        return PathBuf::from(path);
    }

    let dir = config_dir();
    let toml = dir.join("config.toml");
    let json = dir.join("config.json");
    if !toml.exists() && json.exists() {
        json
    } else {
        toml
    }
}
