//! Sliding-window chunker over cleaned document text.
//!
//! The window is `chunk_size` characters and advances by
//! `chunk_size - overlap` per step, so consecutive chunks share exactly
//! `overlap` characters. The trailing remainder is absorbed into the
//! final chunk: once the next window start would leave less than a full
//! window of text beyond it, the current chunk extends to the end. For
//! a 5000-char text with size 1000 / overlap 100 this yields offsets
//! [0, 900, 1800, 2700, 3600] and lengths [1000, 1000, 1000, 1000, 1400].
//!
//! Offsets are character offsets. Boundaries are fixed, not snapped to
//! whitespace: exact offset contiguity is what makes re-ingestion land
//! on identical (paper, chunk index) keys.

use papyrix_common::PipelineConfig;

use crate::models::TextChunk;

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Window length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks; must be smaller
    /// than `chunk_size`.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            overlap: 100,
        }
    }
}

impl From<&PipelineConfig> for ChunkerConfig {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            chunk_size: cfg.chunk_size,
            overlap: cfg.chunk_overlap,
        }
    }
}

/// Split `text` into overlapping chunks for `paper_id`. Empty text
/// yields an empty sequence.
pub fn chunk_text(paper_id: &str, text: &str, cfg: &ChunkerConfig) -> Vec<TextChunk> {
    debug_assert!(cfg.overlap < cfg.chunk_size);

    // Byte offset of every char, so slicing stays valid for non-ASCII
    // text while the public offsets stay character-based.
    let byte_offsets: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
    let n_chars = byte_offsets.len();
    if n_chars == 0 {
        return Vec::new();
    }

    let step = cfg.chunk_size - cfg.overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        // Final chunk once the next window would not fit in full.
        let is_last = start + step + cfg.chunk_size > n_chars;
        let end = if is_last { n_chars } else { start + cfg.chunk_size };

        let byte_start = byte_offsets[start];
        let byte_end = if end == n_chars {
            text.len()
        } else {
            byte_offsets[end]
        };

        chunks.push(TextChunk {
            paper_id: paper_id.to_string(),
            chunk_index: chunks.len(),
            content: text[byte_start..byte_end].to_string(),
            start_offset: start,
            end_offset: end,
        });

        if is_last {
            break;
        }
        start += step;
    }

    chunks
}
