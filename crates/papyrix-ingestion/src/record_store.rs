//! Write-through of catalog records to the metadata store and the
//! search index. Best-effort: one record's failure never aborts the
//! batch.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::models::PaperRecord;
use crate::stores::{MetadataStore, SearchIndex};

#[derive(Debug, Default)]
pub struct RecordUpsertOutcome {
    /// Records that reached the metadata store, in input order.
    pub stored: Vec<PaperRecord>,
    /// (arxiv_id, reason) per failed record.
    pub failures: Vec<(String, String)>,
}

pub struct RecordStore {
    meta: Arc<dyn MetadataStore>,
    search: Arc<dyn SearchIndex>,
}

impl RecordStore {
    pub fn new(meta: Arc<dyn MetadataStore>, search: Arc<dyn SearchIndex>) -> Self {
        Self { meta, search }
    }

    /// Upsert each record into both stores, keyed by `arxiv_id`.
    /// Duplicate ids within the batch are resolved by keeping the last
    /// occurrence. Idempotent: re-submitting a record overwrites.
    #[instrument(skip(self, records), fields(n = records.len()))]
    pub async fn upsert_all(&self, records: Vec<PaperRecord>) -> RecordUpsertOutcome {
        let records = dedup_last_wins(records);
        let mut outcome = RecordUpsertOutcome::default();

        for record in records {
            if let Err(e) = self.meta.upsert_paper(&record).await {
                warn!(arxiv_id = %record.arxiv_id, error = %e, "paper upsert failed");
                outcome.failures.push((record.arxiv_id, e.to_string()));
                continue;
            }
            // The search-index copy is secondary metadata; a failure
            // here keeps the record in the run (the relational row is
            // the source of truth) but is still reported.
            if let Err(e) = self.search.index_paper(&record).await {
                warn!(arxiv_id = %record.arxiv_id, error = %e, "paper search-index write failed");
                outcome
                    .failures
                    .push((record.arxiv_id.clone(), format!("search index: {e}")));
            }
            outcome.stored.push(record);
        }

        debug!(
            stored = outcome.stored.len(),
            failed = outcome.failures.len(),
            "record upsert batch done"
        );
        outcome
    }
}

/// Keep the last occurrence of each id, preserving first-seen order.
fn dedup_last_wins(records: Vec<PaperRecord>) -> Vec<PaperRecord> {
    let mut by_id: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<PaperRecord> = Vec::with_capacity(records.len());
    for record in records {
        match by_id.get(&record.arxiv_id) {
            Some(&i) => out[i] = record,
            None => {
                by_id.insert(record.arxiv_id.clone(), out.len());
                out.push(record);
            }
        }
    }
    out
}
