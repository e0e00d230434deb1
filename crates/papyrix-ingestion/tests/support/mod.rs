//! In-memory doubles for the pipeline's collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use papyrix_common::{PipelineConfig, PipelineError, RetryConfig};
use papyrix_ingestion::acquirer::{FetchError, PdfFetcher, PdfPayload};
use papyrix_ingestion::embedding::{EmbedError, EmbeddingProvider};
use papyrix_ingestion::models::{EmbeddedChunk, PaperRecord, TextChunk};
use papyrix_ingestion::sources::{CatalogBatch, CatalogSource};
use papyrix_ingestion::stores::{MetadataStore, SearchIndex};

pub fn test_config(query: &str) -> PipelineConfig {
    PipelineConfig {
        query: query.to_string(),
        min_pdf_bytes: 64,
        chunk_size: 400,
        chunk_overlap: 40,
        embed_batch_size: 4,
        embed_dim: 8,
        catalog_page_delay_ms: 0,
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
        },
        ..Default::default()
    }
}

pub fn record(id: &str, year: i32) -> PaperRecord {
    PaperRecord {
        arxiv_id: id.to_string(),
        title: format!("Paper {id}"),
        authors: vec!["A. Author".to_string()],
        abstract_text: Some("An abstract.".to_string()),
        year,
        pdf_url: format!("https://arxiv.org/pdf/{id}.pdf"),
    }
}

/// A minimal single-page PDF with `text` as its only content, real
/// enough for the production extractor.
pub fn tiny_pdf(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![50.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().unwrap(),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

// ── Catalog ──────────────────────────────────────────────────────────

pub struct StaticCatalog {
    pub records: Vec<PaperRecord>,
    pub unavailable: bool,
}

impl StaticCatalog {
    pub fn with(records: Vec<PaperRecord>) -> Arc<Self> {
        Arc::new(Self {
            records,
            unavailable: false,
        })
    }

    pub fn down() -> Arc<Self> {
        Arc::new(Self {
            records: vec![],
            unavailable: true,
        })
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn search(
        &self,
        _query: &str,
        _year_start: i32,
        _year_end: i32,
        max_results: Option<usize>,
    ) -> Result<CatalogBatch, PipelineError> {
        if self.unavailable {
            return Err(PipelineError::CatalogUnavailable(
                "connection refused".to_string(),
            ));
        }
        let mut records = self.records.clone();
        if let Some(max) = max_results {
            records.truncate(max);
        }
        Ok(CatalogBatch {
            records,
            skipped_malformed: 0,
            page_failures: vec![],
        })
    }
}

// ── Fetcher ──────────────────────────────────────────────────────────

/// Serves a tiny PDF per known id; urls containing "missing" 404.
/// Counts attempts per url.
pub struct ScriptedFetcher {
    bodies: HashMap<String, Vec<u8>>,
    pub attempts: Mutex<HashMap<String, usize>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            bodies: HashMap::new(),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn serve(mut self, id: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(id.to_string(), body);
        self
    }

    pub fn attempts_for(&self, id: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(url, _)| url.contains(id))
            .map(|(_, n)| n)
            .sum()
    }
}

#[async_trait]
impl PdfFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<PdfPayload, FetchError> {
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;
        let body = self
            .bodies
            .iter()
            .find(|(id, _)| url.contains(id.as_str()))
            .map(|(_, body)| body.clone());
        match body {
            Some(bytes) => Ok(PdfPayload {
                bytes,
                content_type: Some("application/pdf".to_string()),
            }),
            None => Err(FetchError::Fatal("HTTP 404 Not Found".to_string())),
        }
    }
}

// ── Embedder ─────────────────────────────────────────────────────────

/// Deterministic embedder: vector value derived from text length.
/// `fail_batches_containing` forces a hard failure for any batch whose
/// texts contain the marker string.
pub struct FakeEmbedder {
    pub dim: usize,
    pub fail_batches_containing: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            fail_batches_containing: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_batches_containing {
            if texts.iter().any(|t| t.contains(marker.as_str())) {
                return Err(EmbedError::Fatal("model rejected input".to_string()));
            }
        }
        Ok(texts
            .iter()
            .map(|t| vec![t.len() as f32; self.dim])
            .collect())
    }
}

// ── Stores ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct StoreState {
    pub papers: HashMap<String, PaperRecord>,
    pub processed: HashSet<String>,
    pub chunks: HashMap<(String, usize), TextChunk>,
    pub paper_docs: HashSet<String>,
    pub vectors: HashMap<(String, usize), Vec<f32>>,
}

/// One shared in-memory backend implementing both store traits, with
/// per-key failure injection for the relational and vector sides.
#[derive(Clone, Default)]
pub struct MemoryStore {
    pub state: Arc<Mutex<StoreState>>,
    pub fail_relational_chunks: Arc<Mutex<HashSet<(String, usize)>>>,
    pub fail_vector_chunks: Arc<Mutex<HashSet<(String, usize)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_relational_chunk(&self, paper_id: &str, chunk_index: usize) {
        self.fail_relational_chunks
            .lock()
            .unwrap()
            .insert((paper_id.to_string(), chunk_index));
    }

    pub fn fail_vector_chunk(&self, paper_id: &str, chunk_index: usize) {
        self.fail_vector_chunks
            .lock()
            .unwrap()
            .insert((paper_id.to_string(), chunk_index));
    }

    pub fn chunk_count(&self) -> usize {
        self.state.lock().unwrap().chunks.len()
    }

    pub fn vector_count(&self) -> usize {
        self.state.lock().unwrap().vectors.len()
    }

    pub fn is_processed(&self, arxiv_id: &str) -> bool {
        self.state.lock().unwrap().processed.contains(arxiv_id)
    }

    /// Chunk keys present on exactly one side of the dual write.
    pub fn divergent_keys(&self) -> Vec<(String, usize)> {
        let state = self.state.lock().unwrap();
        let relational: HashSet<_> = state.chunks.keys().cloned().collect();
        let vectors: HashSet<_> = state.vectors.keys().cloned().collect();
        relational.symmetric_difference(&vectors).cloned().collect()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn upsert_paper(&self, record: &PaperRecord) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .papers
            .insert(record.arxiv_id.clone(), record.clone());
        Ok(())
    }

    async fn set_processed(&self, arxiv_id: &str, processed: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if processed {
            state.processed.insert(arxiv_id.to_string());
        } else {
            state.processed.remove(arxiv_id);
        }
        Ok(())
    }

    async fn upsert_chunk(&self, chunk: &TextChunk) -> Result<()> {
        let key = (chunk.paper_id.clone(), chunk.chunk_index);
        if self.fail_relational_chunks.lock().unwrap().contains(&key) {
            bail!("relational store rejected chunk");
        }
        self.state.lock().unwrap().chunks.insert(key, chunk.clone());
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for MemoryStore {
    async fn index_paper(&self, record: &PaperRecord) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .paper_docs
            .insert(record.arxiv_id.clone());
        Ok(())
    }

    async fn upsert_chunk_vector(&self, chunk: &EmbeddedChunk) -> Result<()> {
        let key = (chunk.chunk.paper_id.clone(), chunk.chunk.chunk_index);
        if self.fail_vector_chunks.lock().unwrap().contains(&key) {
            bail!("search index rejected chunk");
        }
        self.state
            .lock()
            .unwrap()
            .vectors
            .insert(key, chunk.embedding.clone());
        Ok(())
    }

    async fn delete_chunk_vector(&self, arxiv_id: &str, chunk_index: usize) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .vectors
            .remove(&(arxiv_id.to_string(), chunk_index));
        Ok(())
    }
}
