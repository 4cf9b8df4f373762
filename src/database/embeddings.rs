//! Embedding storage backed by PostgreSQL + pgvector

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::types::{
    EmbeddingRecord, Metadata, NewRecord, Page, RecordPage, RecordUpdate, ScoredRecord, SearchOptions,
};
use crate::core::EmbeddingStore;
use crate::database::{DimensionGuard, PostgresPool};
use crate::error::{Error, Result};

const RECORD_COLUMNS: &str = "id, text, embedding, category, metadata, created_at, updated_at";

#[derive(Debug, FromRow)]
struct EmbeddingRow {
    id: Uuid,
    text: String,
    embedding: Vector,
    category: Option<String>,
    metadata: Option<Json<Metadata>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EmbeddingRow> for EmbeddingRecord {
    fn from(row: EmbeddingRow) -> Self {
        EmbeddingRecord {
            id: row.id,
            text: row.text,
            vector: row.embedding.to_vec(),
            category: row.category,
            metadata: row.metadata.map(|m| m.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ScoredRow {
    #[sqlx(flatten)]
    record: EmbeddingRow,
    similarity: f64,
}

/// Escape `LIKE` wildcards so the query matches as a literal substring
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Advisory lock serializing inserts so the dimensionality check and the
/// INSERT are atomic across every process sharing the table
const DIMENSION_LOCK: i64 = 0x6d65_6d73_746f_7265;

/// Dimensionality of the stored vectors, if any row exists
async fn stored_dimensions<'e, E>(executor: E) -> Result<Option<usize>>
where
    E: sqlx::PgExecutor<'e>,
{
    let row: Option<(i32,)> = sqlx::query_as("SELECT vector_dims(embedding) FROM embeddings LIMIT 1")
        .fetch_optional(executor)
        .await?;
    Ok(row.map(|(dims,)| dims as usize))
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Embedding store backed by PostgreSQL + pgvector
pub struct PgEmbeddingStore {
    pool: PostgresPool,
    dimensions: DimensionGuard,
}

impl PgEmbeddingStore {
    /// Open the store, recovering the established dimensionality from
    /// existing rows. A configured dimensionality must agree with them.
    pub async fn open(pool: PostgresPool, configured: Option<usize>) -> Result<Self> {
        let existing = stored_dimensions(&pool).await?;

        let dimensions = match (configured, existing) {
            (Some(configured), Some(existing)) if configured != existing => {
                return Err(Error::Config(format!(
                    "configured dimensions {} disagree with stored vectors of length {}",
                    configured, existing
                )));
            }
            (configured, existing) => existing.or(configured),
        };

        info!(dimensions = ?dimensions, "Opened PostgreSQL embedding store");
        Ok(PgEmbeddingStore {
            pool,
            dimensions: DimensionGuard::new(dimensions),
        })
    }

    /// Underlying pool
    pub fn pool(&self) -> &PostgresPool {
        &self.pool
    }

    /// Dimensionality to compare against: the local guard, refreshed from
    /// the table when another process may have established it
    async fn current_dimensions(&self) -> Result<Option<usize>> {
        if let Some(dims) = self.dimensions.get() {
            return Ok(Some(dims));
        }
        let stored = stored_dimensions(&self.pool).await?;
        if let Some(dims) = stored {
            self.dimensions.observe(dims);
        }
        Ok(stored)
    }
}

#[async_trait]
impl EmbeddingStore for PgEmbeddingStore {
    fn id(&self) -> &str {
        "postgres"
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions.get()
    }

    async fn save(&self, record: NewRecord) -> Result<EmbeddingRecord> {
        record.validate()?;
        let len = record.vector.len();

        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(DIMENSION_LOCK)
            .execute(&mut *tx)
            .await?;

        // Stored rows are authoritative; the guard covers a configured value
        let stored = stored_dimensions(&mut *tx).await?;
        if let Some(expected) = stored.or(self.dimensions.get()) {
            if expected != len {
                if let Some(dims) = stored {
                    self.dimensions.observe(dims);
                }
                return Err(Error::dimension_mismatch(expected, len));
            }
        }

        let row: EmbeddingRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO embeddings (id, text, embedding, category, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&record.text)
        .bind(Vector::from(record.vector))
        .bind(&record.category)
        .bind(record.metadata.map(Json))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        // Only a committed row fixes the dimensionality
        self.dimensions.observe(len);

        debug!(id = %row.id, "Saved embedding");
        Ok(row.into())
    }

    async fn get(&self, id: Uuid) -> Result<Option<EmbeddingRecord>> {
        let row: Option<EmbeddingRow> =
            sqlx::query_as(&format!("SELECT {RECORD_COLUMNS} FROM embeddings WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Into::into))
    }

    async fn update(&self, id: Uuid, update: RecordUpdate) -> Result<EmbeddingRecord> {
        update.validate()?;

        let row: Option<EmbeddingRow> = sqlx::query_as(&format!(
            r#"
            UPDATE embeddings SET
                text = COALESCE($2, text),
                category = COALESCE($3, category),
                metadata = COALESCE($4, metadata),
                updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')
            WHERE id = $1
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.text)
        .bind(update.category)
        .bind(update.metadata.map(Json))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into)
            .ok_or_else(|| Error::NotFound(format!("embedding {}", id)))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM embeddings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<EmbeddingRecord>> {
        let rows: Vec<EmbeddingRow> = sqlx::query_as(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM embeddings
            WHERE category = $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_all(&self, page: Page) -> Result<RecordPage> {
        let query = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM embeddings
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#
        );
        let rows = async {
            sqlx::query_as::<_, EmbeddingRow>(&query)
                .bind(to_i64(page.limit))
                .bind(to_i64(page.offset))
                .fetch_all(&self.pool)
                .await
                .map_err(Error::from)
        };

        let (rows, total) = futures::try_join!(rows, self.count())?;

        Ok(RecordPage {
            records: rows.into_iter().map(Into::into).collect(),
            total,
        })
    }

    async fn count(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM embeddings")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }

    async fn search_by_text(
        &self,
        query: &str,
        limit: usize,
        category: Option<&str>,
    ) -> Result<Vec<EmbeddingRecord>> {
        let rows: Vec<EmbeddingRow> = sqlx::query_as(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM embeddings
            WHERE text ILIKE '%' || $1 || '%' ESCAPE '\'
              AND ($2::TEXT IS NULL OR category = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#
        ))
        .bind(escape_like(query))
        .bind(category)
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn search_by_similarity(
        &self,
        query: &[f32],
        options: SearchOptions,
    ) -> Result<Vec<ScoredRecord>> {
        options.validate()?;
        crate::core::types::validate_vector(query)?;

        // Nothing stored yet, so nothing can match
        let Some(expected) = self.current_dimensions().await? else {
            return Ok(Vec::new());
        };
        if expected != query.len() {
            return Err(Error::dimension_mismatch(expected, query.len()));
        }

        // Exact scan; the compound ORDER BY keeps ties deterministic.
        // `<=>` is NaN for zero-magnitude vectors, scored as 0.
        let rows: Vec<ScoredRow> = sqlx::query_as(&format!(
            r#"
            WITH scored AS (
                SELECT {RECORD_COLUMNS},
                       COALESCE(NULLIF(1 - (embedding <=> $1), 'NaN'::float8), 0) AS similarity
                FROM embeddings
            )
            SELECT * FROM scored
            WHERE similarity > $2
            ORDER BY similarity DESC, created_at ASC, id ASC
            LIMIT $3
            "#
        ))
        .bind(Vector::from(query.to_vec()))
        .bind(options.threshold)
        .bind(to_i64(options.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ScoredRecord {
                record: row.record.into(),
                similarity: row.similarity,
            })
            .collect())
    }

    async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{init_pool_for_migrations, migrations};

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("cats"), "cats");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
    }

    async fn test_store() -> PgEmbeddingStore {
        let url = std::env::var("TEST_DATABASE_URL").unwrap();
        let config = crate::config::DatabaseConfig {
            url: Some(url.into()),
            ..Default::default()
        };
        let pool = init_pool_for_migrations(&config).await.unwrap();
        migrations::run(&pool).await.unwrap();
        sqlx::query("TRUNCATE embeddings").execute(&pool).await.unwrap();
        PgEmbeddingStore::open(pool, None).await.unwrap()
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL pointing at PostgreSQL with pgvector"]
    async fn test_postgres_store_scenario() {
        let store = test_store().await;

        let cats = store
            .save(NewRecord::new("cats are great", vec![1.0, 0.0, 0.0]).with_category("animals"))
            .await
            .unwrap();
        store
            .save(NewRecord::new("dogs are great", vec![0.9, 0.1, 0.0]).with_category("animals"))
            .await
            .unwrap();
        store
            .save(NewRecord::new("100% cotton", vec![0.0, 1.0, 0.0]))
            .await
            .unwrap();

        assert_eq!(store.get(cats.id).await.unwrap(), Some(cats.clone()));

        let results = store
            .search_by_similarity(&[1.0, 0.0, 0.0], SearchOptions::new(5, 0.5))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.text, "cats are great");
        assert!((results[1].similarity - 0.9939).abs() < 1e-3);

        assert!(matches!(
            store.search_by_similarity(&[1.0, 0.0], SearchOptions::default()).await,
            Err(Error::Validation(_))
        ));

        let page = store.list_all(Page::new(1, 0).unwrap()).await.unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.total, 3);

        let found = store.search_by_text("%", 10, None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(store.search_by_text("GREAT", 10, Some("animals")).await.unwrap().len(), 2);

        let updated = store.update(cats.id, RecordUpdate::new().category("pets")).await.unwrap();
        assert_eq!(updated.text, cats.text);
        assert!(updated.updated_at > cats.updated_at);

        assert!(store.delete(cats.id).await.unwrap());
        assert!(!store.delete(cats.id).await.unwrap());
        assert!(matches!(
            store.update(cats.id, RecordUpdate::new()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL pointing at PostgreSQL with pgvector"]
    async fn test_postgres_zero_vectors_score_zero() {
        let store = test_store().await;
        store.save(NewRecord::new("unit", vec![1.0, 0.0])).await.unwrap();
        store.save(NewRecord::new("zero", vec![0.0, 0.0])).await.unwrap();

        let results = store
            .search_by_similarity(&[1.0, 0.0], SearchOptions::new(10, 0.0))
            .await
            .unwrap();
        let texts: Vec<_> = results.iter().map(|r| r.record.text.as_str()).collect();
        assert_eq!(texts, vec!["unit"]);

        let results = store
            .search_by_similarity(&[0.0, 0.0], SearchOptions::new(10, 0.0))
            .await
            .unwrap();
        assert!(results.is_empty());

        let results = store
            .search_by_similarity(&[0.0, 0.0], SearchOptions::new(10, -0.5))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.similarity == 0.0));
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL pointing at PostgreSQL with pgvector"]
    async fn test_postgres_failed_insert_establishes_nothing() {
        let store = test_store().await;

        // PostgreSQL TEXT rejects NUL bytes, so the INSERT itself fails
        let err = store
            .save(NewRecord::new("nul\0byte", vec![1.0, 0.0, 0.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(store.dimensions(), None);
        assert_eq!(store.count().await.unwrap(), 0);

        store.save(NewRecord::new("flat", vec![1.0, 0.0])).await.unwrap();
        assert_eq!(store.dimensions(), Some(2));
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL pointing at PostgreSQL with pgvector"]
    async fn test_postgres_dimensions_shared_between_instances() {
        let first = test_store().await;
        let second = PgEmbeddingStore::open(first.pool().clone(), None).await.unwrap();
        assert_eq!(first.dimensions(), None);

        second.save(NewRecord::new("cats", vec![1.0, 0.0, 0.0])).await.unwrap();

        // The first instance sees the row established elsewhere
        let results = first
            .search_by_similarity(&[1.0, 0.0, 0.0], SearchOptions::new(5, 0.5))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(first.dimensions(), Some(3));

        let fresh = PgEmbeddingStore::open(first.pool().clone(), None).await.unwrap();
        let stale = PgEmbeddingStore {
            pool: first.pool().clone(),
            dimensions: DimensionGuard::default(),
        };
        assert_eq!(fresh.dimensions(), Some(3));
        assert!(matches!(
            stale.save(NewRecord::new("flat", vec![1.0, 0.0])).await,
            Err(Error::Validation(_))
        ));
        assert_eq!(stale.dimensions(), Some(3));
        assert_eq!(first.count().await.unwrap(), 1);
    }
}
