//! Data model for the ingestion pipeline.

use serde::{Deserialize, Serialize};

/// Canonical catalog record, validated at the boundary. Immutable once
/// stored except for the `processed` flag the pipeline flips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// External id, e.g. `"2301.00001v1"`. Unique across the corpus.
    pub arxiv_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: Option<String>,
    pub year: i32,
    pub pdf_url: String,
}

/// Outcome of one PDF download attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadStatus {
    Succeeded,
    Failed(String),
    SkippedOutOfRange,
}

/// A record plus its downloaded bytes. Lives for one pipeline run only;
/// the payload is never persisted.
#[derive(Debug, Clone)]
pub struct AcquiredDocument {
    pub arxiv_id: String,
    pub status: DownloadStatus,
    pub bytes: Option<Vec<u8>>,
}

impl AcquiredDocument {
    pub fn succeeded(arxiv_id: String, bytes: Vec<u8>) -> Self {
        Self {
            arxiv_id,
            status: DownloadStatus::Succeeded,
            bytes: Some(bytes),
        }
    }

    pub fn failed(arxiv_id: String, reason: impl Into<String>) -> Self {
        Self {
            arxiv_id,
            status: DownloadStatus::Failed(reason.into()),
            bytes: None,
        }
    }

    pub fn skipped(arxiv_id: String) -> Self {
        Self {
            arxiv_id,
            status: DownloadStatus::SkippedOutOfRange,
            bytes: None,
        }
    }
}

/// One bounded span of a document's cleaned text. Offsets are character
/// offsets into the cleaned source; chunk 0 always starts at 0 and
/// indices are contiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub paper_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// A chunk with its embedding vector. Only embedded chunks are ever
/// indexed.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: TextChunk,
    pub embedding: Vec<f32>,
}
