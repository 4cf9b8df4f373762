//! Database module - PostgreSQL + pgvector
//!
//! Provides the embedding store implementations:
//! - PostgreSQL with pgvector: durable records, exact cosine search via `<=>`
//! - In-memory: exact linear scan, same contract, no external service

mod dimension;
mod embeddings;
mod in_memory;
mod postgres;

pub use dimension::DimensionGuard;
pub use embeddings::PgEmbeddingStore;
pub use in_memory::InMemoryEmbeddingStore;
pub use postgres::{init_pool, init_pool_for_migrations, migrations, PostgresPool};
