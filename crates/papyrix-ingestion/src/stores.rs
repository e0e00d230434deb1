//! Store seams for the pipeline.
//!
//! The pipeline talks to the relational metadata store and the vector
//! search index through these traits; production adapters wrap
//! `papyrix-db` and `papyrix-search`, tests substitute in-memory fakes.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use papyrix_db::{ChunkRow, Database, PaperRow};
use papyrix_search::{ChunkDoc, PaperDoc, SearchClient};

use crate::models::{EmbeddedChunk, PaperRecord, TextChunk};

/// Relational metadata store: papers table + chunks table.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn upsert_paper(&self, record: &PaperRecord) -> Result<()>;
    async fn set_processed(&self, arxiv_id: &str, processed: bool) -> Result<()>;
    async fn upsert_chunk(&self, chunk: &TextChunk) -> Result<()>;
}

/// Search index: paper documents plus chunk vectors, upsert-by-key.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn index_paper(&self, record: &PaperRecord) -> Result<()>;
    async fn upsert_chunk_vector(&self, chunk: &EmbeddedChunk) -> Result<()>;
    async fn delete_chunk_vector(&self, arxiv_id: &str, chunk_index: usize) -> Result<()>;
}

// ── Production adapters ──────────────────────────────────────────────

pub struct PgMetadataStore {
    db: Arc<Database>,
}

impl PgMetadataStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn upsert_paper(&self, record: &PaperRecord) -> Result<()> {
        let row = PaperRow {
            arxiv_id: record.arxiv_id.clone(),
            title: record.title.clone(),
            authors: record.authors.clone(),
            abstract_text: record.abstract_text.clone(),
            year: record.year,
            pdf_url: record.pdf_url.clone(),
            processed: false,
        };
        self.db.papers().upsert(&row).await
    }

    async fn set_processed(&self, arxiv_id: &str, processed: bool) -> Result<()> {
        self.db.papers().set_processed(arxiv_id, processed).await
    }

    async fn upsert_chunk(&self, chunk: &TextChunk) -> Result<()> {
        let row = ChunkRow {
            paper_id: chunk.paper_id.clone(),
            chunk_index: chunk.chunk_index as i32,
            content: chunk.content.clone(),
            start_offset: chunk.start_offset as i32,
            end_offset: chunk.end_offset as i32,
        };
        self.db.chunks().upsert(&row).await
    }
}

pub struct OpenSearchIndex {
    client: SearchClient,
}

impl OpenSearchIndex {
    pub fn new(client: SearchClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SearchIndex for OpenSearchIndex {
    async fn index_paper(&self, record: &PaperRecord) -> Result<()> {
        let doc = PaperDoc {
            arxiv_id: record.arxiv_id.clone(),
            title: record.title.clone(),
            authors: record.authors.clone(),
            abstract_text: record.abstract_text.clone(),
            year: record.year,
        };
        self.client.index_paper(&doc).await
    }

    async fn upsert_chunk_vector(&self, chunk: &EmbeddedChunk) -> Result<()> {
        let doc = ChunkDoc {
            arxiv_id: chunk.chunk.paper_id.clone(),
            chunk_idx: chunk.chunk.chunk_index,
            text: chunk.chunk.content.clone(),
            embedding: chunk.embedding.clone(),
        };
        self.client.put_chunk(&doc).await
    }

    async fn delete_chunk_vector(&self, arxiv_id: &str, chunk_index: usize) -> Result<()> {
        self.client.delete_chunk(arxiv_id, chunk_index).await
    }
}
