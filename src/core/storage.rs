//! Storage traits - Abstract interface for the embedding store
//!
//! `EmbeddingStore` is implemented by:
//! - `PgEmbeddingStore`: PostgreSQL + pgvector, durable
//! - `InMemoryEmbeddingStore`: exact linear scan, for tests and embedding in-process
//!
//! Both implementations honor the same contract: per-record atomic
//! mutation, newest-first listing, strict-threshold cosine ranking, and a
//! dimensionality established by the first insert.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Error, Result};

use super::types::{EmbeddingRecord, NewRecord, Page, RecordPage, RecordUpdate, ScoredRecord, SearchOptions};

/// Abstract interface for vector/embedding storage
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Get the backend ID
    fn id(&self) -> &str;

    /// Dimensionality established for this store, if any record fixed it yet
    fn dimensions(&self) -> Option<usize>;

    /// Persist a new record with a fresh ID and timestamps.
    ///
    /// Fails with `Validation` when the vector length differs from the
    /// established dimensionality.
    async fn save(&self, record: NewRecord) -> Result<EmbeddingRecord>;

    /// Retrieve a record by ID
    async fn get(&self, id: Uuid) -> Result<Option<EmbeddingRecord>>;

    /// Retrieve a record by ID, failing with `NotFound` when absent
    async fn fetch(&self, id: Uuid) -> Result<EmbeddingRecord> {
        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("embedding {}", id)))
    }

    /// Overwrite only the supplied fields; `updated_at` is always refreshed
    async fn update(&self, id: Uuid, update: RecordUpdate) -> Result<EmbeddingRecord>;

    /// Remove a record; `true` iff it existed
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// All records with the given category, newest first
    async fn list_by_category(&self, category: &str) -> Result<Vec<EmbeddingRecord>>;

    /// One page of records, newest first, with the unfiltered total
    async fn list_all(&self, page: Page) -> Result<RecordPage>;

    /// Number of records in the store
    async fn count(&self) -> Result<u64>;

    /// Case-insensitive substring match on text, newest first
    async fn search_by_text(
        &self,
        query: &str,
        limit: usize,
        category: Option<&str>,
    ) -> Result<Vec<EmbeddingRecord>>;

    /// Nearest neighbours by cosine similarity, most similar first
    async fn search_by_similarity(
        &self,
        query: &[f32],
        options: SearchOptions,
    ) -> Result<Vec<ScoredRecord>>;

    /// Health check
    async fn health_check(&self) -> Result<bool>;
}
