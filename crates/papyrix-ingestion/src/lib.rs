//! Ingestion-to-index pipeline for arXiv papers.
//!
//! Flow: catalog fetch → record store (Postgres + search index) →
//! bounded-concurrency PDF acquisition → text extraction → chunking →
//! batched embedding → dual-store index writes. Each stage after
//! acquisition runs per document so one bad paper never blocks the
//! rest; every dropped unit lands in the run report.

pub mod acquirer;
pub mod chunker;
pub mod embedding;
pub mod extractor;
pub mod index_writer;
pub mod models;
pub mod pipeline;
pub mod record_store;
pub mod report;
pub mod sources;
pub mod stores;
