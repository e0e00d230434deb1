//! Bounded-concurrency PDF acquisition.
//!
//! Records outside the year range are marked skipped without a request.
//! The rest download under a semaphore (default 10 permits — remote
//! fairness, and whole PDFs are held in memory); excess work queues on
//! the semaphore rather than being rejected. Transient failures retry
//! with backoff; a 404 or a non-PDF content type fails immediately.
//! Failures are reported per document, never thrown across the batch.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use papyrix_common::{PipelineConfig, PipelineError, RetryPolicy};

use crate::models::{AcquiredDocument, PaperRecord};

/// Raw download result before validation.
#[derive(Debug, Clone)]
pub struct PdfPayload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Download error split by retriability. Timeouts and 5xx are worth
/// retrying; a 404 or malformed URL never is.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{0}")]
    Transient(String),
    #[error("{0}")]
    Fatal(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

#[async_trait]
pub trait PdfFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PdfPayload, FetchError>;
}

// ── HTTP fetcher ─────────────────────────────────────────────────────

pub struct HttpPdfFetcher {
    http: reqwest::Client,
}

impl HttpPdfFetcher {
    pub fn new() -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .user_agent("papyrix/0.1 (research ingestion)")
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PdfFetcher for HttpPdfFetcher {
    async fn fetch(&self, url: &str) -> Result<PdfPayload, FetchError> {
        let resp = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                FetchError::Transient(format!("request failed: {e}"))
            } else {
                FetchError::Fatal(format!("request failed: {e}"))
            }
        })?;

        let status = resp.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(FetchError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(FetchError::Fatal(format!("HTTP {status}")));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transient(format!("body read failed: {e}")))?;

        Ok(PdfPayload {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

// ── Acquirer ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AcquirerConfig {
    pub concurrency: usize,
    pub min_pdf_bytes: usize,
    pub year_start: i32,
    pub year_end: i32,
    pub retry: RetryPolicy,
}

impl From<&PipelineConfig> for AcquirerConfig {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            concurrency: cfg.download_concurrency,
            min_pdf_bytes: cfg.min_pdf_bytes,
            year_start: cfg.year_start,
            year_end: cfg.year_end,
            retry: RetryPolicy::new(cfg.retry.clone()),
        }
    }
}

pub struct DocumentAcquirer {
    fetcher: Arc<dyn PdfFetcher>,
    cfg: AcquirerConfig,
}

impl DocumentAcquirer {
    pub fn new(fetcher: Arc<dyn PdfFetcher>, cfg: AcquirerConfig) -> Self {
        Self { fetcher, cfg }
    }

    /// Download PDFs for all in-range records. Completion order across
    /// documents is unspecified; every input record appears exactly
    /// once in the output.
    #[instrument(skip(self, records, cancel), fields(n = records.len()))]
    pub async fn acquire(
        &self,
        records: &[PaperRecord],
        cancel: &CancellationToken,
    ) -> Vec<AcquiredDocument> {
        let semaphore = Arc::new(Semaphore::new(self.cfg.concurrency.max(1)));
        let mut tasks: JoinSet<AcquiredDocument> = JoinSet::new();
        let mut out = Vec::with_capacity(records.len());

        for record in records {
            if record.year < self.cfg.year_start || record.year > self.cfg.year_end {
                debug!(arxiv_id = %record.arxiv_id, year = record.year, "out of year range, skipping");
                out.push(AcquiredDocument::skipped(record.arxiv_id.clone()));
                continue;
            }
            if cancel.is_cancelled() {
                out.push(AcquiredDocument::failed(
                    record.arxiv_id.clone(),
                    "run cancelled before download",
                ));
                continue;
            }

            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let fetcher = self.fetcher.clone();
            let cfg = self.cfg.clone();
            let arxiv_id = record.arxiv_id.clone();
            let url = record.pdf_url.clone();

            tasks.spawn(async move {
                // Queue on the semaphore; a cancellation that lands
                // while we wait means the download is never issued.
                let _permit = match semaphore.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => {
                        return AcquiredDocument::failed(arxiv_id, "semaphore closed");
                    }
                };
                if cancel.is_cancelled() {
                    return AcquiredDocument::failed(arxiv_id, "run cancelled before download");
                }
                download_one(fetcher.as_ref(), &cfg, arxiv_id, &url).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(doc) => out.push(doc),
                Err(e) => warn!(error = %e, "download task panicked"),
            }
        }

        let succeeded = out
            .iter()
            .filter(|d| matches!(d.status, crate::models::DownloadStatus::Succeeded))
            .count();
        info!(total = out.len(), succeeded, "document acquisition done");
        out
    }
}

async fn download_one(
    fetcher: &dyn PdfFetcher,
    cfg: &AcquirerConfig,
    arxiv_id: String,
    url: &str,
) -> AcquiredDocument {
    let payload = match cfg
        .retry
        .run(|| fetcher.fetch(url), FetchError::is_transient)
        .await
    {
        Ok(p) => p,
        Err(e) => {
            warn!(arxiv_id = %arxiv_id, url, error = %e, "download failed");
            return AcquiredDocument::failed(arxiv_id, e.to_string());
        }
    };

    // A successful status with the wrong payload is still a failure:
    // partial bodies and HTML error pages must not reach extraction.
    if let Some(ct) = payload.content_type.as_deref() {
        if !ct.contains("pdf") {
            return AcquiredDocument::failed(arxiv_id, format!("unexpected content type {ct}"));
        }
    }
    if payload.bytes.len() < cfg.min_pdf_bytes {
        return AcquiredDocument::failed(
            arxiv_id,
            format!("truncated download: {} bytes", payload.bytes.len()),
        );
    }

    debug!(arxiv_id = %arxiv_id, bytes = payload.bytes.len(), "downloaded");
    AcquiredDocument::succeeded(arxiv_id, payload.bytes)
}
