//! Provider module - boundary to the external generation services
//!
//! - `OpenAIProvider`: OpenAI-compatible HTTP API (vectors and completions)
//! - `LocalEmbedder`: fastembed ONNX model (vectors only)
//! - `Retrying<P>`: opt-in backoff around either

mod local;
mod openai;
mod retry;

pub use local::LocalEmbedder;
pub use openai::OpenAIProvider;
pub use retry::Retrying;

use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::info;

use crate::config::{ProviderConfig, ProviderKind};
use crate::core::{Completer, Embedder};
use crate::error::Result;

/// The providers selected by configuration
#[derive(Clone)]
pub struct Providers {
    /// Vector generation
    pub embedder: Arc<dyn Embedder>,
    /// Completion generation, when available
    pub completer: Option<Arc<dyn Completer>>,
}

/// Build the configured providers, each wrapped in the retry policy
pub fn build(config: &ProviderConfig) -> Result<Providers> {
    let has_openai_key = !config.openai.api_key.expose_secret().is_empty();

    let providers = match config.kind {
        ProviderKind::OpenAI => {
            let openai = Arc::new(Retrying::new(
                OpenAIProvider::new(config.openai.clone())?,
                config.retry.clone(),
            ));
            Providers {
                embedder: openai.clone(),
                completer: Some(openai),
            }
        }
        ProviderKind::Local => {
            let embedder: Arc<dyn Embedder> = Arc::new(Retrying::new(
                LocalEmbedder::new(&config.local)?,
                config.retry.clone(),
            ));
            // Completions still go to OpenAI when a key is configured
            let completer: Option<Arc<dyn Completer>> = if has_openai_key {
                Some(Arc::new(Retrying::new(
                    OpenAIProvider::new(config.openai.clone())?,
                    config.retry.clone(),
                )))
            } else {
                None
            };
            Providers { embedder, completer }
        }
    };

    info!(
        kind = %config.kind,
        model = providers.embedder.model(),
        completions = providers.completer.is_some(),
        "Providers ready"
    );
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_build_openai() {
        let mut config = ProviderConfig::default();
        config.openai.api_key = SecretString::from("sk-test");

        let providers = build(&config).unwrap();
        assert_eq!(providers.embedder.model(), "text-embedding-ada-002");
        assert_eq!(providers.embedder.dimensions(), Some(1536));
        assert_eq!(
            providers.completer.as_ref().map(|c| c.model().to_string()),
            Some("gpt-3.5-turbo".to_string())
        );
    }
}
