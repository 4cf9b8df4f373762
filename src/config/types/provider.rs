//! Provider configuration types
//!
//! Configuration for the vector / completion provider (OpenAI-compatible
//! HTTP API or a local fastembed model) and its retry policy.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Which provider generates vectors
    #[serde(default)]
    pub kind: ProviderKind,
    /// OpenAI-compatible API settings
    #[serde(default)]
    pub openai: OpenAIConfig,
    /// Local model settings
    #[serde(default)]
    pub local: LocalEmbeddingConfig,
    /// Retry policy around provider calls
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Provider kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible HTTP API (vectors and completions)
    #[default]
    OpenAI,
    /// Local fastembed model (vectors only)
    Local,
}

impl std::str::FromStr for ProviderKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "local" | "fastembed" => Ok(ProviderKind::Local),
            _ => Err(crate::error::Error::Config(format!(
                "Invalid embedding provider: {}. Valid options: openai, local",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAI => write!(f, "openai"),
            ProviderKind::Local => write!(f, "local"),
        }
    }
}

fn default_secret() -> SecretString {
    SecretString::from(String::new())
}

/// OpenAI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// API key
    #[serde(skip_serializing, default = "default_secret")]
    pub api_key: SecretString,
    /// Base URL
    #[serde(default = "default_openai_url")]
    pub base_url: String,
    /// Model used for vectors
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Model used for completions
    #[serde(default = "default_completion_model")]
    pub completion_model: String,
    /// Completion token cap
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Completion sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        OpenAIConfig {
            api_key: default_secret(),
            base_url: default_openai_url(),
            embedding_model: default_embedding_model(),
            completion_model: default_completion_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout: default_timeout(),
        }
    }
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_completion_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Local embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalEmbeddingConfig {
    /// fastembed model name
    #[serde(default = "default_local_model")]
    pub model: String,
}

impl Default for LocalEmbeddingConfig {
    fn default() -> Self {
        LocalEmbeddingConfig {
            model: default_local_model(),
        }
    }
}

fn default_local_model() -> String {
    "multilingual-e5-small".to_string()
}

/// Retry policy for provider calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt; 0 disables retrying
    #[serde(default)]
    pub max_retries: u32,
    /// First backoff interval
    #[serde(default = "default_initial_interval", with = "humantime_serde")]
    pub initial_interval: Duration,
    /// Backoff interval cap
    #[serde(default = "default_max_interval", with = "humantime_serde")]
    pub max_interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 0,
            initial_interval: default_initial_interval(),
            max_interval: default_max_interval(),
        }
    }
}

fn default_initial_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_max_interval() -> Duration {
    Duration::from_secs(10)
}
