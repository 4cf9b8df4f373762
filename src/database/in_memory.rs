//! In-process embedding store
//!
//! Exact linear scan over records kept in insertion order. Satisfies the
//! same contract as the PostgreSQL store; used in tests and when no
//! database is configured.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::core::similarity::rank;
use crate::core::types::{
    validate_vector, EmbeddingRecord, NewRecord, Page, RecordPage, RecordUpdate, ScoredRecord, SearchOptions,
};
use crate::core::EmbeddingStore;
use crate::database::DimensionGuard;
use crate::error::{Error, Result};

/// Embedding store held entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryEmbeddingStore {
    records: RwLock<Vec<EmbeddingRecord>>,
    dimensions: DimensionGuard,
}

impl InMemoryEmbeddingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with a pre-established dimensionality
    pub fn with_dimensions(dimensions: usize) -> Self {
        InMemoryEmbeddingStore {
            records: RwLock::new(Vec::new()),
            dimensions: DimensionGuard::new(Some(dimensions)),
        }
    }
}

/// Newest first: `created_at` descending, later insertions first on ties
fn newest_first<'a>(records: impl DoubleEndedIterator<Item = &'a EmbeddingRecord>) -> Vec<&'a EmbeddingRecord> {
    let mut sorted: Vec<_> = records.rev().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted
}

#[async_trait]
impl EmbeddingStore for InMemoryEmbeddingStore {
    fn id(&self) -> &str {
        "memory"
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions.get()
    }

    async fn save(&self, record: NewRecord) -> Result<EmbeddingRecord> {
        record.validate()?;

        let mut records = self.records.write().await;
        self.dimensions.establish(record.vector.len())?;

        let record = EmbeddingRecord::create(record);
        records.push(record.clone());

        debug!(id = %record.id, "Saved embedding");
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<EmbeddingRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn update(&self, id: Uuid, update: RecordUpdate) -> Result<EmbeddingRecord> {
        update.validate()?;

        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(format!("embedding {}", id)))?;

        record.apply(update);
        Ok(record.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut records = self.records.write().await;
        match records.iter().position(|r| r.id == id) {
            Some(pos) => {
                records.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<EmbeddingRecord>> {
        let records = self.records.read().await;
        Ok(newest_first(records.iter())
            .into_iter()
            .filter(|r| r.category.as_deref() == Some(category))
            .cloned()
            .collect())
    }

    async fn list_all(&self, page: Page) -> Result<RecordPage> {
        let records = self.records.read().await;
        let total = records.len() as u64;
        let records = newest_first(records.iter())
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect();

        Ok(RecordPage { records, total })
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.read().await.len() as u64)
    }

    async fn search_by_text(
        &self,
        query: &str,
        limit: usize,
        category: Option<&str>,
    ) -> Result<Vec<EmbeddingRecord>> {
        let needle = query.to_lowercase();
        let records = self.records.read().await;

        Ok(newest_first(records.iter())
            .into_iter()
            .filter(|r| category.is_none() || r.category.as_deref() == category)
            .filter(|r| r.text.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn search_by_similarity(
        &self,
        query: &[f32],
        options: SearchOptions,
    ) -> Result<Vec<ScoredRecord>> {
        options.validate()?;
        validate_vector(query)?;

        // Nothing stored yet, so nothing can match
        if self.dimensions.get().is_none() {
            return Ok(Vec::new());
        }
        self.dimensions.check(query.len())?;

        let records = self.records.read().await;

        // Oldest first so that ranking's stable sort breaks ties by age
        let mut candidates: Vec<&EmbeddingRecord> = records.iter().collect();
        candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let ranked = rank(
            query,
            candidates.into_iter().map(|r| (r, r.vector.as_slice())),
            &options,
        )?;

        Ok(ranked
            .into_iter()
            .map(|(record, similarity)| ScoredRecord {
                record: record.clone(),
                similarity,
            })
            .collect())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
