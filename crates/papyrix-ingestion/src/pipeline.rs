//! End-to-end ingestion run: catalog walk, metadata upsert, PDF
//! acquisition, extraction, chunking, embedding, dual-store indexing.
//!
//! Failure policy: an unreachable catalog aborts the run (nothing to
//! work with); every later stage degrades per document or per batch and
//! the run carries on, with each loss recorded in the [`RunReport`].
//! Replaying the same query is safe end to end — every persisted
//! artifact is a keyed upsert.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use papyrix_common::{PipelineConfig, PipelineError};

use crate::acquirer::{AcquirerConfig, DocumentAcquirer, PdfFetcher};
use crate::chunker::{chunk_text, ChunkerConfig};
use crate::embedding::{EmbeddingBatcher, EmbeddingProvider};
use crate::extractor::extract_text;
use crate::index_writer::IndexWriter;
use crate::models::{AcquiredDocument, DownloadStatus};
use crate::record_store::RecordStore;
use crate::report::{RunReport, Stage};
use crate::sources::CatalogSource;
use crate::stores::{MetadataStore, SearchIndex};

pub struct IngestionPipeline {
    cfg: PipelineConfig,
    catalog: Arc<dyn CatalogSource>,
    fetcher: Arc<dyn PdfFetcher>,
    embedder: Arc<dyn EmbeddingProvider>,
    meta: Arc<dyn MetadataStore>,
    search: Arc<dyn SearchIndex>,
}

impl IngestionPipeline {
    pub fn new(
        cfg: PipelineConfig,
        catalog: Arc<dyn CatalogSource>,
        fetcher: Arc<dyn PdfFetcher>,
        embedder: Arc<dyn EmbeddingProvider>,
        meta: Arc<dyn MetadataStore>,
        search: Arc<dyn SearchIndex>,
    ) -> Result<Self, PipelineError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            catalog,
            fetcher,
            embedder,
            meta,
            search,
        })
    }

    /// Run one ingestion pass for the configured query. Cancelling the
    /// token stops new downloads and per-document processing promptly;
    /// work already persisted stays persisted.
    #[instrument(skip_all, fields(query = %self.cfg.query))]
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let mut report = RunReport::new();
        info!(run_id = %report.run_id, "ingestion run starting");

        // Catalog. Total unavailability is the one fatal stage.
        let batch = self
            .catalog
            .search(
                &self.cfg.query,
                self.cfg.year_start,
                self.cfg.year_end,
                self.cfg.max_results,
            )
            .await?;
        report.papers_found = batch.records.len();
        for reason in &batch.page_failures {
            report.record_failure(Stage::Catalog, "catalog page", reason.clone());
        }
        if batch.skipped_malformed > 0 {
            report.record_failure(
                Stage::Catalog,
                "catalog entries",
                format!("{} malformed entries skipped", batch.skipped_malformed),
            );
        }

        // Metadata upsert. Records that fail here never reach download.
        let record_store = RecordStore::new(self.meta.clone(), self.search.clone());
        let upserted = record_store.upsert_all(batch.records).await;
        report.papers_stored = upserted.stored.len();
        for (arxiv_id, reason) in upserted.failures {
            report.record_failure(Stage::MetadataUpsert, arxiv_id, reason);
        }

        // Acquisition.
        let acquirer = DocumentAcquirer::new(self.fetcher.clone(), AcquirerConfig::from(&self.cfg));
        let documents = acquirer.acquire(&upserted.stored, cancel).await;
        for doc in &documents {
            match &doc.status {
                DownloadStatus::Succeeded => report.downloads_succeeded += 1,
                DownloadStatus::SkippedOutOfRange => report.downloads_skipped += 1,
                DownloadStatus::Failed(reason) => {
                    report.record_failure(Stage::Download, doc.arxiv_id.clone(), reason.clone());
                }
            }
        }

        // Per-document processing.
        let batcher = EmbeddingBatcher::from_config(self.embedder.clone(), &self.cfg);
        let writer = IndexWriter::new(self.meta.clone(), self.search.clone());
        let chunker_cfg = ChunkerConfig::from(&self.cfg);
        for doc in &documents {
            if cancel.is_cancelled() {
                info!("run cancelled, stopping document processing");
                break;
            }
            if doc.status != DownloadStatus::Succeeded {
                continue;
            }
            self.process_document(doc, &chunker_cfg, &batcher, &writer, &mut report)
                .await;
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            run_id = %report.run_id,
            papers_found = report.papers_found,
            papers_stored = report.papers_stored,
            downloads_succeeded = report.downloads_succeeded,
            chunks_indexed = report.chunks_indexed,
            papers_completed = report.papers_completed,
            failures = report.failures.len(),
            duration_ms = report.duration_ms,
            "ingestion run finished"
        );
        Ok(report)
    }

    async fn process_document(
        &self,
        doc: &AcquiredDocument,
        chunker_cfg: &ChunkerConfig,
        batcher: &EmbeddingBatcher,
        writer: &IndexWriter,
        report: &mut RunReport,
    ) {
        let bytes = match &doc.bytes {
            Some(b) => b,
            None => return,
        };

        let text = match extract_text(bytes) {
            Ok(t) => t,
            Err(e) => {
                warn!(arxiv_id = %doc.arxiv_id, error = %e, "extraction failed");
                report.record_failure(Stage::Extraction, doc.arxiv_id.clone(), e.to_string());
                return;
            }
        };
        report.documents_extracted += 1;

        let chunks = chunk_text(&doc.arxiv_id, &text, chunker_cfg);
        report.chunks_produced += chunks.len();
        let expected = chunks.len();

        let outcome = batcher.embed_chunks(chunks).await;
        report.chunks_embedded += outcome.embedded.len();
        for failed in &outcome.failed {
            for chunk in &failed.chunks {
                report.record_failure(
                    Stage::Embedding,
                    format!("{}#{}", chunk.paper_id, chunk.chunk_index),
                    failed.reason.clone(),
                );
            }
        }

        let indexed = writer.write_chunks(&outcome.embedded).await;
        report.chunks_indexed += indexed.written;
        for failure in &indexed.failures {
            report.record_failure(
                Stage::Indexing,
                format!("{}#{}", failure.paper_id, failure.chunk_index),
                failure.reason.clone(),
            );
        }

        // A paper is complete only when every chunk it produced made it
        // into both stores; anything less leaves it eligible for a
        // later replay.
        if indexed.written == expected {
            self.mark_processed(&doc.arxiv_id, report).await;
        }
    }

    async fn mark_processed(&self, arxiv_id: &str, report: &mut RunReport) {
        match self.meta.set_processed(arxiv_id, true).await {
            Ok(()) => report.papers_completed += 1,
            Err(e) => {
                warn!(arxiv_id = %arxiv_id, error = %e, "processed-flag update failed");
                report.record_failure(Stage::Indexing, arxiv_id, format!("processed flag: {e:#}"));
            }
        }
    }
}
