//! Error types for memstore

use thiserror::Error;

/// Result type alias using memstore's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for memstore
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input: shape, dimensionality, pagination, metadata
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Embedding store persistence failure
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Cache command rejected by the cache server
    #[error("Cache error: {0}")]
    Cache(#[source] redis::RedisError),

    /// Cache not connected, or the connection failed mid-operation
    #[error("Connection error: {0}")]
    Connection(String),

    /// Embedding / completion provider failure
    #[error("Provider error: {message}")]
    Provider {
        /// Upstream failure description
        message: String,
        /// Whether a later attempt may succeed (rate limit, 5xx, transport)
        retryable: bool,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Permanent provider failure
    pub fn provider(message: impl Into<String>) -> Self {
        Error::Provider {
            message: message.into(),
            retryable: false,
        }
    }

    /// Transient provider failure (rate limit, upstream 5xx, transport)
    pub fn provider_transient(message: impl Into<String>) -> Self {
        Error::Provider {
            message: message.into(),
            retryable: true,
        }
    }

    /// Vector length does not match the established dimensionality
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Error::Validation(format!(
            "vector dimension mismatch: expected {}, got {}",
            expected, actual
        ))
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Provider { retryable, .. } => *retryable,
            Error::Connection(_) => true,
            _ => false,
        }
    }

    /// Check if error is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::NotFound(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let retryable = err.is_timeout()
            || err.is_connect()
            || err.status().is_some_and(|s| s.is_server_error());
        Error::Provider {
            message: err.to_string(),
            retryable,
        }
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            Error::Connection(err.to_string())
        } else {
            Error::Cache(err)
        }
    }
}
