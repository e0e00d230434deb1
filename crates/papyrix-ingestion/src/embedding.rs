//! Chunk embedding through an Ollama-compatible endpoint.
//!
//! Chunks go to the provider in order, in batches of at most
//! `embed_batch_size`. Transient provider errors retry with backoff; a
//! response with the wrong vector count or dimensionality is a contract
//! violation and fails the batch outright. A failed batch takes down
//! only its own chunks.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use papyrix_common::{PipelineConfig, PipelineError, RetryPolicy};

use crate::models::{EmbeddedChunk, TextChunk};

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("{0}")]
    Transient(String),
    #[error("{0}")]
    Fatal(String),
}

impl EmbedError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EmbedError::Transient(_))
    }
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `texts`, returning one vector per input in the same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

// ── Ollama provider ──────────────────────────────────────────────────

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct OllamaEmbedder {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/api/embed", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let body = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    EmbedError::Transient(format!("embed request failed: {e}"))
                } else {
                    EmbedError::Fatal(format!("embed request failed: {e}"))
                }
            })?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(EmbedError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(EmbedError::Fatal(format!("HTTP {status}")));
        }

        let parsed: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| EmbedError::Fatal(format!("malformed embed response: {e}")))?;
        Ok(parsed.embeddings)
    }
}

// ── Batcher ──────────────────────────────────────────────────────────

/// A batch the provider could not embed; its chunks are reported and
/// excluded from indexing.
#[derive(Debug)]
pub struct FailedBatch {
    pub chunks: Vec<TextChunk>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct EmbedOutcome {
    pub embedded: Vec<EmbeddedChunk>,
    pub failed: Vec<FailedBatch>,
}

pub struct EmbeddingBatcher {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    expected_dim: usize,
    retry: RetryPolicy,
}

impl EmbeddingBatcher {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        expected_dim: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            expected_dim,
            retry,
        }
    }

    pub fn from_config(provider: Arc<dyn EmbeddingProvider>, cfg: &PipelineConfig) -> Self {
        Self::new(
            provider,
            cfg.embed_batch_size,
            cfg.embed_dim,
            RetryPolicy::new(cfg.retry.clone()),
        )
    }

    /// Embed all chunks in input order. Output `embedded` preserves the
    /// relative order of its inputs even when earlier batches fail.
    #[instrument(skip(self, chunks), fields(n = chunks.len()))]
    pub async fn embed_chunks(&self, chunks: Vec<TextChunk>) -> EmbedOutcome {
        let mut outcome = EmbedOutcome::default();
        let mut batch = Vec::with_capacity(self.batch_size);
        for chunk in chunks {
            batch.push(chunk);
            if batch.len() == self.batch_size {
                self.embed_batch(std::mem::take(&mut batch), &mut outcome)
                    .await;
            }
        }
        if !batch.is_empty() {
            self.embed_batch(batch, &mut outcome).await;
        }
        debug!(
            embedded = outcome.embedded.len(),
            failed_batches = outcome.failed.len(),
            "embedding pass done"
        );
        outcome
    }

    async fn embed_batch(&self, batch: Vec<TextChunk>, outcome: &mut EmbedOutcome) {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = match self
            .retry
            .run(|| self.provider.embed(&texts), EmbedError::is_transient)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                warn!(batch_len = batch.len(), error = %e, "embedding batch failed");
                outcome.failed.push(FailedBatch {
                    chunks: batch,
                    reason: e.to_string(),
                });
                return;
            }
        };

        if vectors.len() != batch.len() {
            outcome.failed.push(FailedBatch {
                reason: format!(
                    "provider returned {} vectors for {} inputs",
                    vectors.len(),
                    batch.len()
                ),
                chunks: batch,
            });
            return;
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.expected_dim) {
            outcome.failed.push(FailedBatch {
                reason: format!(
                    "expected dimension {}, provider returned {}",
                    self.expected_dim,
                    bad.len()
                ),
                chunks: batch,
            });
            return;
        }

        outcome.embedded.extend(
            batch
                .into_iter()
                .zip(vectors)
                .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding }),
        );
    }
}
