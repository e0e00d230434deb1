//! OpenSearch client for the search side of the dual store.
//!
//! Two indices: a lightweight paper-metadata index and a chunk index
//! carrying a `knn_vector` field (hnsw / cosinesimil / lucene) plus the
//! (arxiv id, chunk index) pair as filterable metadata. All writes are
//! upserts keyed by document id, so re-ingestion overwrites.

use anyhow::{anyhow, Context, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument};

use papyrix_common::ServicesConfig;

/// Paper document mirrored into the search index alongside the
/// relational row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperDoc {
    pub arxiv_id: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub year: i32,
}

/// One chunk vector plus its retrievable metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDoc {
    pub arxiv_id: String,
    pub chunk_idx: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A k-NN hit.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub arxiv_id: String,
    pub chunk_idx: usize,
    pub text: String,
    pub score: f32,
}

/// Stable document id for a chunk: `"<arxiv_id>_<chunk_idx>"`.
pub fn chunk_doc_id(arxiv_id: &str, chunk_idx: usize) -> String {
    format!("{arxiv_id}_{chunk_idx}")
}

#[derive(Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    papers_index: String,
    chunks_index: String,
}

impl SearchClient {
    pub fn new(cfg: &ServicesConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build opensearch http client")?;
        Ok(Self {
            http,
            base_url: cfg.opensearch_url.trim_end_matches('/').to_string(),
            username: cfg.opensearch_user.clone(),
            password: cfg.opensearch_pass.clone(),
            papers_index: cfg.papers_index.clone(),
            chunks_index: cfg.chunks_index.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(self.url(path))
            .basic_auth(&self.username, Some(&self.password))
    }

    fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .put(self.url(path))
            .basic_auth(&self.username, Some(&self.password))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(self.url(path))
            .basic_auth(&self.username, Some(&self.password))
    }

    fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .delete(self.url(path))
            .basic_auth(&self.username, Some(&self.password))
    }

    // ── Index bootstrap ──────────────────────────────────────────────

    /// Create both indices if missing. Safe to call on every run.
    #[instrument(skip(self))]
    pub async fn ensure_indices(&self, embed_dim: usize) -> Result<()> {
        self.ensure_index(&self.papers_index, papers_mapping()).await?;
        self.ensure_index(&self.chunks_index, chunks_mapping(embed_dim))
            .await?;
        Ok(())
    }

    async fn ensure_index(&self, index: &str, mapping: serde_json::Value) -> Result<()> {
        let exists = self
            .get(index)
            .send()
            .await
            .with_context(|| format!("index lookup failed for {index}"))?;
        if exists.status() == StatusCode::OK {
            debug!(index, "index already exists");
            return Ok(());
        }

        let resp = self
            .put(index)
            .json(&mapping)
            .send()
            .await
            .with_context(|| format!("index create request failed for {index}"))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("index create failed for {index}: {status} {body}"));
        }
        info!(index, "created index");
        Ok(())
    }

    // ── Papers ───────────────────────────────────────────────────────

    pub async fn index_paper(&self, doc: &PaperDoc) -> Result<()> {
        let path = format!("{}/_doc/{}", self.papers_index, doc.arxiv_id);
        let resp = self
            .put(&path)
            .json(doc)
            .send()
            .await
            .with_context(|| format!("paper index request failed for {}", doc.arxiv_id))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "paper index failed for {}: {status} {body}",
                doc.arxiv_id
            ));
        }
        Ok(())
    }

    // ── Chunks ───────────────────────────────────────────────────────

    pub async fn put_chunk(&self, doc: &ChunkDoc) -> Result<()> {
        let id = chunk_doc_id(&doc.arxiv_id, doc.chunk_idx);
        let path = format!("{}/_doc/{id}", self.chunks_index);
        let resp = self
            .put(&path)
            .json(doc)
            .send()
            .await
            .with_context(|| format!("chunk index request failed for {id}"))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("chunk index failed for {id}: {status} {body}"));
        }
        Ok(())
    }

    /// Delete a chunk document. A missing document is not an error so
    /// the compensating path stays idempotent.
    pub async fn delete_chunk(&self, arxiv_id: &str, chunk_idx: usize) -> Result<()> {
        let id = chunk_doc_id(arxiv_id, chunk_idx);
        let path = format!("{}/_doc/{id}", self.chunks_index);
        let resp = self
            .delete(&path)
            .send()
            .await
            .with_context(|| format!("chunk delete request failed for {id}"))?;
        if !resp.status().is_success() && resp.status() != StatusCode::NOT_FOUND {
            let status = resp.status();
            return Err(anyhow!("chunk delete failed for {id}: {status}"));
        }
        Ok(())
    }

    /// k-nearest-neighbour query over chunk vectors.
    #[instrument(skip(self, vector))]
    pub async fn knn_search(&self, vector: &[f32], k: usize) -> Result<Vec<ChunkHit>> {
        let body = serde_json::json!({
            "size": k,
            "query": {
                "knn": {
                    "embedding": { "vector": vector, "k": k }
                }
            }
        });
        let path = format!("{}/_search", self.chunks_index);
        let resp: serde_json::Value = self
            .post(&path)
            .json(&body)
            .send()
            .await
            .context("knn search request failed")?
            .error_for_status()
            .context("knn search returned an error status")?
            .json()
            .await
            .context("knn search response was not json")?;

        let hits = resp["hits"]["hits"].as_array().cloned().unwrap_or_default();
        debug!(n = hits.len(), "knn search returned hits");

        Ok(hits
            .iter()
            .filter_map(|h| {
                let src = &h["_source"];
                Some(ChunkHit {
                    arxiv_id: src["arxiv_id"].as_str()?.to_string(),
                    chunk_idx: src["chunk_idx"].as_u64()? as usize,
                    text: src["text"].as_str().unwrap_or("").to_string(),
                    score: h["_score"].as_f64().unwrap_or(0.0) as f32,
                })
            })
            .collect())
    }
}

// ── Index mappings ───────────────────────────────────────────────────

fn papers_mapping() -> serde_json::Value {
    serde_json::json!({
        "settings": {
            "analysis": {
                "analyzer": {
                    "scientific_analyzer": { "type": "standard", "stopwords": "_english_" }
                }
            }
        },
        "mappings": {
            "properties": {
                "arxiv_id": { "type": "keyword" },
                "title":    { "type": "text" },
                "abstract": { "type": "text" },
                "authors":  { "type": "keyword" },
                "year":     { "type": "integer" }
            }
        }
    })
}

fn chunks_mapping(embed_dim: usize) -> serde_json::Value {
    serde_json::json!({
        "settings": { "index": { "knn": true } },
        "mappings": {
            "properties": {
                "arxiv_id":  { "type": "keyword" },
                "chunk_idx": { "type": "integer" },
                "text":      { "type": "text" },
                "embedding": {
                    "type": "knn_vector",
                    "dimension": embed_dim,
                    "method": {
                        "name": "hnsw",
                        "space_type": "cosinesimil",
                        "engine": "lucene"
                    }
                }
            }
        }
    })
}
