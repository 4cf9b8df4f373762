//! Core module - Fundamental traits and types for memstore
//!
//! This module defines the abstractions the rest of the crate plugs into:
//! - Storage trait for the embedding store
//! - Cache backend trait for the key/value layer
//! - Provider traits for vector and completion generation
//! - The record data model and similarity ranking

pub mod cache;
pub mod provider;
pub mod similarity;
pub mod storage;
pub mod types;

// Re-export core traits for convenient access
pub use cache::CacheBackend;
pub use provider::{Completer, Embedder};
pub use similarity::cosine_similarity;
pub use storage::EmbeddingStore;
pub use types::*;
