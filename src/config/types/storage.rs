//! Storage configuration types
//!
//! Connection settings for the PostgreSQL + pgvector embedding store.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// PostgreSQL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL; takes precedence over the discrete fields
    #[serde(skip_serializing, default)]
    pub url: Option<SecretString>,
    /// Server host
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login user
    #[serde(default = "default_username")]
    pub username: String,
    /// Login password
    #[serde(skip_serializing, default)]
    pub password: Option<SecretString>,
    /// Database name
    #[serde(default = "default_name")]
    pub name: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Pool acquire timeout
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Pre-established vector dimensionality (otherwise fixed by the first insert)
    #[serde(default)]
    pub dimensions: Option<usize>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: None,
            host: default_host(),
            port: default_port(),
            username: default_username(),
            password: None,
            name: default_name(),
            max_connections: default_max_connections(),
            connect_timeout: default_connect_timeout(),
            dimensions: None,
        }
    }
}

impl DatabaseConfig {
    /// Build sqlx connect options from the URL or the discrete fields
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url.expose_secret())
                .map_err(|e| Error::Config(format!("Invalid DATABASE_URL: {}", e)));
        }

        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .database(&self.name);
        if let Some(password) = &self.password {
            options = options.password(password.expose_secret());
        }
        Ok(options)
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_username() -> String {
    "postgres".to_string()
}

fn default_name() -> String {
    "nest_ai".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}
