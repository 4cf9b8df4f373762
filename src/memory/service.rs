//! Memory service - composes vector generation with storage
//!
//! Generation always happens first; if it fails the store is never touched.
//! Query vectors may be memoized in the cache layer; that memo is strictly
//! auxiliary and its failures never fail a search.

use serde::{Deserialize, Serialize};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::CacheLayer;
use crate::config::SearchConfig;
use crate::core::types::{validate_vector, EmbeddingRecord, Metadata, NewRecord, ScoredRecord};
use crate::core::{Completer, Embedder, EmbeddingStore};
use crate::error::{Error, Result};

/// Memoized query vector; the text guards against hash collisions
#[derive(Debug, Serialize, Deserialize)]
struct CachedVector {
    text: String,
    vector: Vec<f32>,
}

/// Memo key for a query vector, scoped by model
fn vector_key(model: &str, text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    model.hash(&mut hasher);
    text.hash(&mut hasher);
    format!("memstore:vector:{}:{:016x}", model, hasher.finish())
}

/// Orchestrates vector generation, the embedding store and the cache
#[derive(Clone)]
pub struct MemoryService {
    store: Arc<dyn EmbeddingStore>,
    embedder: Arc<dyn Embedder>,
    completer: Option<Arc<dyn Completer>>,
    cache: Option<(Arc<CacheLayer>, Duration)>,
    search: SearchConfig,
}

impl MemoryService {
    /// Create a new memory service
    pub fn new(store: Arc<dyn EmbeddingStore>, embedder: Arc<dyn Embedder>) -> Self {
        MemoryService {
            store,
            embedder,
            completer: None,
            cache: None,
            search: SearchConfig::default(),
        }
    }

    /// Enable completions
    pub fn with_completer(mut self, completer: Arc<dyn Completer>) -> Self {
        self.completer = Some(completer);
        self
    }

    /// Memoize query vectors in `cache` for `ttl`; a zero TTL disables it
    pub fn with_vector_cache(mut self, cache: Arc<CacheLayer>, ttl: Duration) -> Self {
        self.cache = (!ttl.is_zero()).then_some((cache, ttl));
        self
    }

    /// Override the similarity search defaults
    pub fn with_search_config(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    /// The embedding store
    pub fn store(&self) -> &Arc<dyn EmbeddingStore> {
        &self.store
    }

    /// Generate a vector for `text` and persist it as a new record
    pub async fn save_text(
        &self,
        text: &str,
        category: Option<String>,
        metadata: Option<Metadata>,
    ) -> Result<EmbeddingRecord> {
        if text.is_empty() {
            return Err(Error::Validation("text must not be empty".into()));
        }

        let vector = self.generate_vector(text).await?;

        let record = self
            .store
            .save(
                NewRecord::new(text, vector)
                    .with_category_opt(category)
                    .with_metadata_opt(metadata),
            )
            .await?;

        info!(id = %record.id, dimensions = record.dimensions(), "Saved text");
        Ok(record)
    }

    /// Generate a query vector for `query` and rank stored records against it.
    ///
    /// `limit` and `threshold` fall back to the configured search defaults.
    pub async fn search_by_text(
        &self,
        query: &str,
        limit: Option<usize>,
        threshold: Option<f64>,
    ) -> Result<Vec<ScoredRecord>> {
        if query.is_empty() {
            return Err(Error::Validation("query must not be empty".into()));
        }
        let options = self.search.options(limit, threshold);
        options.validate()?;

        let vector = self.query_vector(query).await?;
        let results = self.store.search_by_similarity(&vector, options).await?;

        info!(
            results = results.len(),
            limit = options.limit,
            threshold = options.threshold,
            "Similarity search"
        );
        Ok(results)
    }

    /// Generate a vector without storing anything
    pub async fn generate_vector(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.embedder.generate_vector(text).await?;
        validate_vector(&vector)
            .map_err(|e| Error::provider(format!("provider returned an unusable vector: {}", e)))?;
        Ok(vector)
    }

    /// Generate a completion for `prompt`
    pub async fn generate_completion(&self, prompt: &str) -> Result<String> {
        let completer = self
            .completer
            .as_ref()
            .ok_or_else(|| Error::provider("no completion provider configured"))?;
        completer.generate_completion(prompt).await
    }

    /// Query vector, served from the memo when possible
    async fn query_vector(&self, query: &str) -> Result<Vec<f32>> {
        let Some((cache, ttl)) = &self.cache else {
            return self.generate_vector(query).await;
        };

        let key = vector_key(self.embedder.model(), query);
        match cache.get_json::<CachedVector>(&key).await {
            Ok(Some(cached)) if cached.text == query => {
                debug!(key = %key, "Query vector cache hit");
                return Ok(cached.vector);
            }
            Ok(_) => {}
            Err(e) => warn!("Query vector cache lookup failed: {}", e),
        }

        let vector = self.generate_vector(query).await?;

        let entry = CachedVector {
            text: query.to_string(),
            vector,
        };
        if let Err(e) = cache.set_json(&key, &entry, Some(*ttl)).await {
            warn!("Failed to cache query vector: {}", e);
        }
        Ok(entry.vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalCache;
    use crate::core::types::parse_metadata;
    use crate::database::InMemoryEmbeddingStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed vectors per text and counts calls
    struct FixedEmbedder {
        vectors: HashMap<&'static str, Vec<f32>>,
        calls: AtomicUsize,
    }

    impl FixedEmbedder {
        fn new() -> Self {
            FixedEmbedder {
                vectors: HashMap::from([
                    ("cats are great", vec![1.0, 0.0, 0.0]),
                    ("dogs are great", vec![0.9, 0.1, 0.0]),
                    ("stock prices", vec![0.0, 0.0, 1.0]),
                    ("kittens", vec![1.0, 0.0, 0.0]),
                    ("flat", vec![1.0, 0.0]),
                ]),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model(&self) -> &str {
            "fixed"
        }

        async fn generate_vector(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| Error::provider(format!("no vector for '{}'", text)))
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model(&self) -> &str {
            "failing"
        }

        async fn generate_vector(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::provider_transient("upstream unavailable"))
        }
    }

    struct EchoCompleter;

    #[async_trait]
    impl Completer for EchoCompleter {
        fn model(&self) -> &str {
            "echo"
        }

        async fn generate_completion(&self, prompt: &str) -> Result<String> {
            Ok(format!("echo: {}", prompt))
        }
    }

    fn service() -> (MemoryService, Arc<FixedEmbedder>) {
        let embedder = Arc::new(FixedEmbedder::new());
        let service = MemoryService::new(Arc::new(InMemoryEmbeddingStore::new()), embedder.clone());
        (service, embedder)
    }

    #[tokio::test]
    async fn test_save_text() {
        let (service, _) = service();
        let metadata = parse_metadata(r#"{"source":"test"}"#).unwrap();

        let record = service
            .save_text("cats are great", Some("animals".into()), Some(metadata.clone()))
            .await
            .unwrap();

        assert_eq!(record.vector, vec![1.0, 0.0, 0.0]);
        assert_eq!(record.category.as_deref(), Some("animals"));
        assert_eq!(record.metadata, Some(metadata));
        assert_eq!(service.store().get(record.id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_generation_failure_saves_nothing() {
        let store = Arc::new(InMemoryEmbeddingStore::new());
        let service = MemoryService::new(store.clone(), Arc::new(FailingEmbedder));

        let err = service.save_text("anything", None, None).await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(store.dimensions(), None);

        let err = service.search_by_text("anything", None, None).await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }

    #[tokio::test]
    async fn test_search_by_text_scenario() {
        let (service, _) = service();
        service.save_text("cats are great", Some("animals".into()), None).await.unwrap();
        service.save_text("dogs are great", Some("animals".into()), None).await.unwrap();
        service.save_text("stock prices", None, None).await.unwrap();

        let results = service.search_by_text("kittens", Some(5), Some(0.5)).await.unwrap();
        let texts: Vec<_> = results.iter().map(|r| r.record.text.as_str()).collect();
        assert_eq!(texts, vec!["cats are great", "dogs are great"]);

        // Default threshold 0.8 and limit 10
        let results = service.search_by_text("kittens", None, None).await.unwrap();
        assert_eq!(results.len(), 2);

        let results = service.search_by_text("kittens", Some(1), None).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_search_dimension_mismatch() {
        let (service, _) = service();
        service.save_text("cats are great", None, None).await.unwrap();

        let err = service.search_by_text("flat", None, None).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_search_validation_happens_before_generation() {
        let (service, embedder) = service();
        assert!(matches!(
            service.search_by_text("kittens", None, Some(f64::NAN)).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            service.save_text("", None, None).await,
            Err(Error::Validation(_))
        ));
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_query_vector_memoized() {
        let (service, embedder) = service();
        let cache = Arc::new(CacheLayer::with_backend(Arc::new(LocalCache::default())));
        let service = service.with_vector_cache(cache.clone(), Duration::from_secs(60));

        service.save_text("cats are great", None, None).await.unwrap();
        service.search_by_text("kittens", None, None).await.unwrap();
        service.search_by_text("kittens", None, None).await.unwrap();

        // One call for the save, one for the first search
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_cache_failure_does_not_fail_search() {
        let (service, embedder) = service();
        let cache = Arc::new(CacheLayer::new());
        let service = service.with_vector_cache(cache, Duration::from_secs(60));

        service.save_text("cats are great", None, None).await.unwrap();
        let results = service.search_by_text("kittens", None, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_generate_completion() {
        let (service, _) = service();
        assert!(matches!(
            service.generate_completion("hi").await,
            Err(Error::Provider { .. })
        ));

        let service = service.with_completer(Arc::new(EchoCompleter));
        assert_eq!(service.generate_completion("hi").await.unwrap(), "echo: hi");
    }

    #[test]
    fn test_vector_key() {
        assert_eq!(vector_key("m", "a"), vector_key("m", "a"));
        assert_ne!(vector_key("m", "a"), vector_key("m", "b"));
        assert_ne!(vector_key("m1", "a"), vector_key("m2", "a"));
    }
}
