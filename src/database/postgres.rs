//! PostgreSQL pool setup and schema migrations

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

/// PostgreSQL connection pool type alias
pub type PostgresPool = PgPool;

/// Connect a pool and require the pgvector extension
pub async fn init_pool(config: &DatabaseConfig) -> Result<PostgresPool> {
    connect(config, true).await
}

/// Connect a pool without the pgvector check, for `migrations::run`
pub async fn init_pool_for_migrations(config: &DatabaseConfig) -> Result<PostgresPool> {
    connect(config, false).await
}

async fn connect(config: &DatabaseConfig, require_pgvector: bool) -> Result<PostgresPool> {
    info!(
        host = %config.host,
        database = %config.name,
        max_connections = config.max_connections,
        "Initializing PostgreSQL connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout)
        .connect_with(config.connect_options()?)
        .await?;

    verify_database(&pool, require_pgvector).await?;

    info!("PostgreSQL pool ready");
    Ok(pool)
}

async fn verify_database(pool: &PgPool, require_pgvector: bool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    if require_pgvector {
        let installed: Option<(String,)> =
            sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(pool)
                .await?;

        if installed.is_none() {
            return Err(Error::Storage(sqlx::Error::Configuration(
                "pgvector extension is not installed. Run: memstore migrate (or CREATE EXTENSION vector;)".into()
            )));
        }
    }

    Ok(())
}

/// Schema migrations for the embedding store
pub mod migrations {
    use super::*;
    use tracing::{debug, warn};

    /// Schema statements, applied in order; each is idempotent.
    /// Dimensionality is enforced by the store, so the column is unconstrained.
    const SCHEMA: &[&str] = &[
        r#"CREATE TABLE IF NOT EXISTS embeddings (
            id UUID PRIMARY KEY,
            text TEXT NOT NULL,
            embedding vector NOT NULL,
            category VARCHAR(255),
            metadata JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
        "CREATE INDEX IF NOT EXISTS idx_embeddings_category ON embeddings(category)",
        "CREATE INDEX IF NOT EXISTS idx_embeddings_created_at ON embeddings(created_at DESC, id DESC)",
    ];

    /// Enable pgvector and create the embeddings table and its indexes
    pub async fn run(pool: &PgPool) -> Result<()> {
        info!("Migrating embedding schema");

        // Needs superuser unless the extension is already installed
        if let Err(e) = sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(pool)
            .await
        {
            warn!("Could not enable pgvector ({}); ask a superuser to run CREATE EXTENSION vector", e);
        }

        for statement in SCHEMA.iter().copied() {
            debug!(statement = %statement.lines().next().unwrap_or_default().trim(), "Applying");
            sqlx::query(statement).execute(pool).await?;
        }

        info!(statements = SCHEMA.len(), "Embedding schema up to date");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL pointing at PostgreSQL with pgvector"]
    async fn test_init_pool_and_migrate() {
        let url = std::env::var("TEST_DATABASE_URL").unwrap();
        let config = DatabaseConfig {
            url: Some(url.into()),
            ..DatabaseConfig::default()
        };

        let pool = init_pool_for_migrations(&config).await.unwrap();
        migrations::run(&pool).await.unwrap();
        // Idempotent
        migrations::run(&pool).await.unwrap();

        assert!(init_pool(&config).await.is_ok());
    }
}
