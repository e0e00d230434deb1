//! Paper metadata repository. Upserts are keyed by the external
//! `arxiv_id`; re-submitting an identical record is a plain overwrite
//! and never creates a second row.

use anyhow::{Context, Result};
use sqlx::PgPool;

#[derive(Debug, Clone, PartialEq)]
pub struct PaperRow {
    pub arxiv_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: Option<String>,
    pub year: i32,
    pub pdf_url: String,
    pub processed: bool,
}

#[derive(Clone)]
pub struct PaperRepository {
    pool: PgPool,
}

impl PaperRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert-or-overwrite by `arxiv_id`. The `processed` flag is left
    /// untouched on conflict so re-ingestion does not reset pipeline
    /// progress.
    pub async fn upsert(&self, row: &PaperRow) -> Result<()> {
        let authors = serde_json::to_value(&row.authors)?;
        sqlx::query(
            r#"
            INSERT INTO papers (arxiv_id, title, authors, abstract_text, year, pdf_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (arxiv_id) DO UPDATE SET
                title         = EXCLUDED.title,
                authors       = EXCLUDED.authors,
                abstract_text = EXCLUDED.abstract_text,
                year          = EXCLUDED.year,
                pdf_url       = EXCLUDED.pdf_url
            "#,
        )
        .bind(&row.arxiv_id)
        .bind(&row.title)
        .bind(&authors)
        .bind(&row.abstract_text)
        .bind(row.year)
        .bind(&row.pdf_url)
        .execute(&self.pool)
        .await
        .with_context(|| format!("paper upsert failed for {}", row.arxiv_id))?;
        Ok(())
    }

    pub async fn set_processed(&self, arxiv_id: &str, processed: bool) -> Result<()> {
        sqlx::query("UPDATE papers SET processed = $1 WHERE arxiv_id = $2")
            .bind(processed)
            .bind(arxiv_id)
            .execute(&self.pool)
            .await
            .context("set_processed failed")?;
        Ok(())
    }

    pub async fn find(&self, arxiv_id: &str) -> Result<Option<PaperRow>> {
        let row: Option<(String, String, serde_json::Value, Option<String>, i32, String, bool)> =
            sqlx::query_as(
                r#"
                SELECT arxiv_id, title, authors, abstract_text, year, pdf_url, processed
                FROM papers WHERE arxiv_id = $1
                "#,
            )
            .bind(arxiv_id)
            .fetch_optional(&self.pool)
            .await
            .context("paper lookup failed")?;

        row.map(
            |(arxiv_id, title, authors, abstract_text, year, pdf_url, processed)| {
                let authors: Vec<String> = serde_json::from_value(authors)?;
                Ok(PaperRow {
                    arxiv_id,
                    title,
                    authors,
                    abstract_text,
                    year,
                    pdf_url,
                    processed,
                })
            },
        )
        .transpose()
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM papers")
            .fetch_one(&self.pool)
            .await
            .context("paper count failed")
    }

    pub async fn count_processed(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM papers WHERE processed")
            .fetch_one(&self.pool)
            .await
            .context("processed paper count failed")
    }
}
