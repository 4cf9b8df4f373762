//! Generation provider traits - the boundary to external model services
//!
//! Vector generation and text completion are separate traits: a local
//! ONNX model can embed but not complete, while an HTTP provider does both.
//! Implementations report every upstream failure as `Error::Provider`.

use async_trait::async_trait;

use crate::error::Result;

/// Produces a fixed-length vector for a text
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier; part of any cache key derived from vectors
    fn model(&self) -> &str;

    /// Output dimensionality, when known ahead of the first call
    fn dimensions(&self) -> Option<usize> {
        None
    }

    /// Generate the vector for `text`
    async fn generate_vector(&self, text: &str) -> Result<Vec<f32>>;
}

/// Produces a completion for a prompt
#[async_trait]
pub trait Completer: Send + Sync {
    /// Model identifier
    fn model(&self) -> &str;

    /// Generate a completion for `prompt`
    async fn generate_completion(&self, prompt: &str) -> Result<String>;
}
