//! Chunk repository. One row per (paper, chunk index); the write is an
//! idempotent upsert so re-running the index step overwrites instead of
//! appending.

use anyhow::{Context, Result};
use sqlx::PgPool;

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRow {
    pub paper_id: String,
    pub chunk_index: i32,
    pub content: String,
    pub start_offset: i32,
    pub end_offset: i32,
}

#[derive(Clone)]
pub struct ChunkRepository {
    pool: PgPool,
}

impl ChunkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, row: &ChunkRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chunks (paper_id, chunk_index, content, start_offset, end_offset)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (paper_id, chunk_index) DO UPDATE SET
                content      = EXCLUDED.content,
                start_offset = EXCLUDED.start_offset,
                end_offset   = EXCLUDED.end_offset
            "#,
        )
        .bind(&row.paper_id)
        .bind(row.chunk_index)
        .bind(&row.content)
        .bind(row.start_offset)
        .bind(row.end_offset)
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!(
                "chunk upsert failed for {} #{}",
                row.paper_id, row.chunk_index
            )
        })?;
        Ok(())
    }

    /// Delete one chunk row. Deleting a missing row is a no-op.
    pub async fn delete(&self, paper_id: &str, chunk_index: i32) -> Result<()> {
        sqlx::query("DELETE FROM chunks WHERE paper_id = $1 AND chunk_index = $2")
            .bind(paper_id)
            .bind(chunk_index)
            .execute(&self.pool)
            .await
            .context("chunk delete failed")?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await
            .context("chunk count failed")
    }

    pub async fn count_for_paper(&self, paper_id: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE paper_id = $1")
            .bind(paper_id)
            .fetch_one(&self.pool)
            .await
            .context("per-paper chunk count failed")
    }
}
