//! Local vector generation via fastembed
//!
//! Models auto-download on first use. Inference runs on the blocking pool.

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use tracing::info;

use crate::config::LocalEmbeddingConfig;
use crate::core::Embedder;
use crate::error::{Error, Result};

/// Resolve a configured model name to a fastembed model and its dimensionality
fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize)> {
    match name.to_lowercase().as_str() {
        "multilingual-e5-small" => Ok((EmbeddingModel::MultilingualE5Small, 384)),
        "multilingual-e5-base" => Ok((EmbeddingModel::MultilingualE5Base, 768)),
        "all-minilm-l6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((EmbeddingModel::BGEBaseENV15, 768)),
        other => Err(Error::Config(format!(
            "Unknown local embedding model: {}. Valid options: multilingual-e5-small, \
             multilingual-e5-base, all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
            other
        ))),
    }
}

/// Local embedder wrapping fastembed
#[derive(Clone)]
pub struct LocalEmbedder {
    model: Arc<TextEmbedding>,
    name: String,
    dimensions: usize,
}

impl LocalEmbedder {
    /// Load the configured model, downloading it on first use
    pub fn new(config: &LocalEmbeddingConfig) -> Result<Self> {
        let (model, dimensions) = resolve_model(&config.model)?;
        info!(model = %config.model, dimensions, "Loading local embedding model");

        let model = TextEmbedding::try_new(InitOptions::new(model).with_show_download_progress(true))
            .map_err(|e| Error::provider(format!("Failed to init embedding model: {}", e)))?;

        Ok(LocalEmbedder {
            model: Arc::new(model),
            name: config.model.clone(),
            dimensions,
        })
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn model(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }

    async fn generate_vector(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model.clone();
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let embeddings = model
                .embed(vec![text], None)
                .map_err(|e| Error::provider(format!("Embedding error: {}", e)))?;
            embeddings
                .into_iter()
                .next()
                .ok_or_else(|| Error::provider("No embedding returned"))
        })
        .await
        .map_err(|e| Error::Internal(format!("Embedding task join error: {}", e)))?
    }
}
