//! # memstore
//!
//! A semantic memory store: text persisted with its embedding vector,
//! retrieved by cosine similarity, category, or substring, plus a typed
//! key/value cache for transient state.
//!
//! ## Layout
//!
//! - **core:** record model, cosine ranking, and the seam traits
//!   (`EmbeddingStore`, `CacheBackend`, `Embedder`, `Completer`)
//! - **database:** PostgreSQL + pgvector store and an in-memory store
//! - **cache:** `CacheLayer` over moka (in-process) or Redis
//! - **provider:** OpenAI-compatible HTTP and local fastembed providers
//! - **memory:** `MemoryService`, which generates vectors and stores or searches them

pub mod cache;
pub mod config;
pub mod core;
pub mod database;
pub mod error;
pub mod memory;
pub mod provider;

pub use config::Config;
pub use error::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
