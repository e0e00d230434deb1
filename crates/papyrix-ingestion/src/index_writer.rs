//! Dual-store chunk persistence.
//!
//! Each embedded chunk lands in two places: the vector document in the
//! search index and the chunk row in the relational store. The vector
//! write goes first; if the relational write then fails, the vector
//! document is deleted again so the two stores never disagree about
//! which chunks exist. Both writes are keyed upserts, so replaying a
//! chunk overwrites rather than duplicates.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::models::EmbeddedChunk;
use crate::stores::{MetadataStore, SearchIndex};

#[derive(Debug)]
pub struct IndexFailure {
    pub paper_id: String,
    pub chunk_index: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IndexOutcome {
    pub written: usize,
    pub failures: Vec<IndexFailure>,
}

impl IndexOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct IndexWriter {
    meta: Arc<dyn MetadataStore>,
    search: Arc<dyn SearchIndex>,
}

impl IndexWriter {
    pub fn new(meta: Arc<dyn MetadataStore>, search: Arc<dyn SearchIndex>) -> Self {
        Self { meta, search }
    }

    /// Persist every chunk, one dual write at a time. A chunk whose
    /// pair fails twice is recorded and the rest continue.
    #[instrument(skip(self, chunks), fields(n = chunks.len()))]
    pub async fn write_chunks(&self, chunks: &[EmbeddedChunk]) -> IndexOutcome {
        let mut outcome = IndexOutcome::default();
        for chunk in chunks {
            let mut last_err = None;
            for _ in 0..2 {
                match self.write_pair(chunk).await {
                    Ok(()) => {
                        last_err = None;
                        break;
                    }
                    Err(e) => last_err = Some(e),
                }
            }
            match last_err {
                None => outcome.written += 1,
                Some(reason) => {
                    warn!(
                        paper_id = %chunk.chunk.paper_id,
                        chunk_index = chunk.chunk.chunk_index,
                        %reason,
                        "chunk persist failed"
                    );
                    outcome.failures.push(IndexFailure {
                        paper_id: chunk.chunk.paper_id.clone(),
                        chunk_index: chunk.chunk.chunk_index,
                        reason,
                    });
                }
            }
        }
        debug!(written = outcome.written, failed = outcome.failures.len(), "index write done");
        outcome
    }

    async fn write_pair(&self, chunk: &EmbeddedChunk) -> Result<(), String> {
        self.search
            .upsert_chunk_vector(chunk)
            .await
            .map_err(|e| format!("vector write: {e:#}"))?;

        if let Err(e) = self.meta.upsert_chunk(&chunk.chunk).await {
            // Roll the vector document back; a leftover orphan there
            // would surface chunks the relational store never accepted.
            if let Err(del) = self
                .search
                .delete_chunk_vector(&chunk.chunk.paper_id, chunk.chunk.chunk_index)
                .await
            {
                warn!(
                    paper_id = %chunk.chunk.paper_id,
                    chunk_index = chunk.chunk.chunk_index,
                    error = %del,
                    "compensating vector delete failed"
                );
            }
            return Err(format!("relational write: {e:#}"));
        }
        Ok(())
    }
}
