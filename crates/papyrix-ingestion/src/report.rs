//! Per-run accounting. One `RunReport` per pipeline invocation,
//! serializable for logs or an operator dashboard.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Catalog,
    MetadataUpsert,
    Download,
    Extraction,
    Embedding,
    Indexing,
}

/// One recorded failure. `subject` is the arxiv id, or the id plus a
/// chunk index for chunk-level failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub subject: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub papers_found: usize,
    pub papers_stored: usize,
    pub downloads_succeeded: usize,
    pub downloads_skipped: usize,
    pub documents_extracted: usize,
    pub chunks_produced: usize,
    pub chunks_embedded: usize,
    pub chunks_indexed: usize,
    pub papers_completed: usize,
    pub failures: Vec<StageFailure>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            papers_found: 0,
            papers_stored: 0,
            downloads_succeeded: 0,
            downloads_skipped: 0,
            documents_extracted: 0,
            chunks_produced: 0,
            chunks_embedded: 0,
            chunks_indexed: 0,
            papers_completed: 0,
            failures: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn record_failure(&mut self, stage: Stage, subject: impl Into<String>, reason: impl Into<String>) {
        self.failures.push(StageFailure {
            stage,
            subject: subject.into(),
            reason: reason.into(),
        });
    }

    pub fn failures_in(&self, stage: Stage) -> usize {
        self.failures.iter().filter(|f| f.stage == stage).count()
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}
