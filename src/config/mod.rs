//! Configuration module - Modular configuration management
//!
//! - types/mod.rs: Top-level `Config`, search and logging sections
//! - types/storage.rs: PostgreSQL store configuration
//! - types/cache.rs: Cache backend configuration
//! - types/provider.rs: Vector / completion provider configuration
//! - io.rs: Configuration loading and saving
//! - validation.rs: Configuration validation
//! - paths.rs: Configuration file paths

mod io;
mod paths;
mod types;
mod validation;

// Re-export core config types
pub use types::{Config, LogConfig, LogFormat, SearchConfig};

// Re-export storage types
pub use types::storage::DatabaseConfig;

// Re-export cache types
pub use types::cache::{CacheBackendType, CacheConfig, LocalCacheConfig, RedisConfig};

// Re-export provider types
pub use types::provider::{
    LocalEmbeddingConfig, OpenAIConfig, ProviderConfig, ProviderKind, RetryConfig,
};

// Re-export IO and utilities
pub use io::{apply_env_overrides, apply_overrides, load_config, load_config_from_path, save_config};
pub use paths::{config_dir, config_path};
pub use validation::{validate_config, ConfigValidationResult, ValidationIssue};
