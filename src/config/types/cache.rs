//! Cache configuration types
//!
//! Selects the cache backend (in-process moka or a Redis server) and its
//! connection and retention settings.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend type
    #[serde(default)]
    pub backend: CacheBackendType,
    /// Redis settings (used when `backend = "redis"`)
    #[serde(default)]
    pub redis: RedisConfig,
    /// In-process settings (used when `backend = "local"`)
    #[serde(default)]
    pub local: LocalCacheConfig,
    /// How long generated query vectors are memoized; zero disables
    #[serde(default = "default_vector_ttl", with = "humantime_serde")]
    pub vector_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            backend: CacheBackendType::default(),
            redis: RedisConfig::default(),
            local: LocalCacheConfig::default(),
            vector_ttl: default_vector_ttl(),
        }
    }
}

/// Cache backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendType {
    /// In-process (default, no external service)
    #[default]
    Local,
    /// Shared Redis server
    Redis,
}

impl std::str::FromStr for CacheBackendType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.to_lowercase().as_str() {
            "local" | "memory" | "moka" => Ok(CacheBackendType::Local),
            "redis" => Ok(CacheBackendType::Redis),
            _ => Err(crate::error::Error::Config(format!(
                "Invalid cache backend: {}. Valid options: local, redis",
                s
            ))),
        }
    }
}

impl std::fmt::Display for CacheBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendType::Local => write!(f, "local"),
            CacheBackendType::Redis => write!(f, "redis"),
        }
    }
}

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Server host
    #[serde(default = "default_redis_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_redis_port")]
    pub port: u16,
    /// AUTH password
    #[serde(skip_serializing, default)]
    pub password: Option<SecretString>,
    /// Logical database index
    #[serde(default)]
    pub db: i64,
    /// Time allowed to establish the connection
    #[serde(default = "default_redis_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Time allowed for a single command
    #[serde(default = "default_redis_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: default_redis_host(),
            port: default_redis_port(),
            password: None,
            db: 0,
            connect_timeout: default_redis_connect_timeout(),
            command_timeout: default_redis_command_timeout(),
        }
    }
}

impl RedisConfig {
    /// Connection URL; contains the password, never log it
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) if !password.expose_secret().is_empty() => format!(
                "redis://:{}@{}:{}/{}",
                password.expose_secret(),
                self.host,
                self.port,
                self.db
            ),
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    /// Host and port, safe to log
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// In-process cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalCacheConfig {
    /// Maximum number of keys before eviction
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for LocalCacheConfig {
    fn default() -> Self {
        LocalCacheConfig {
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_redis_host() -> String {
    "localhost".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_redis_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_redis_command_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_capacity() -> u64 {
    10_000
}

fn default_vector_ttl() -> Duration {
    Duration::from_secs(30 * 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.backend, CacheBackendType::Local);
        assert_eq!(config.vector_ttl, Duration::from_secs(1800));
    }

    #[test]
    fn test_redis_url() {
        let mut config = RedisConfig::default();
        assert_eq!(config.url(), "redis://localhost:6379/0");

        config.password = Some(SecretString::from("s3cret"));
        config.db = 2;
        assert_eq!(config.url(), "redis://:s3cret@localhost:6379/2");
        assert_eq!(config.address(), "localhost:6379");
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("redis".parse::<CacheBackendType>().unwrap(), CacheBackendType::Redis);
        assert_eq!("moka".parse::<CacheBackendType>().unwrap(), CacheBackendType::Local);
        assert!("memcached".parse::<CacheBackendType>().is_err());
    }
}
