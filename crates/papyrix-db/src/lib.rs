//! PostgreSQL metadata store: papers and chunks tables, upserts keyed
//! by external id and (paper id, chunk index).

pub mod chunks;
pub mod papers;
mod schema;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub use chunks::{ChunkRepository, ChunkRow};
pub use papers::{PaperRepository, PaperRow};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("failed to connect to postgres")?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist. Safe to call on
    /// every startup.
    pub async fn init_schema(&self) -> Result<()> {
        for stmt in schema::STATEMENTS {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .with_context(|| format!("schema statement failed: {stmt}"))?;
        }
        tracing::debug!("database schema ensured");
        Ok(())
    }

    pub fn papers(&self) -> PaperRepository {
        PaperRepository::new(self.pool.clone())
    }

    pub fn chunks(&self) -> ChunkRepository {
        ChunkRepository::new(self.pool.clone())
    }
}
