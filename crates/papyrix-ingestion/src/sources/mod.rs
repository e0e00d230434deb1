//! Catalog source clients.

pub mod arxiv;

use async_trait::async_trait;

use papyrix_common::PipelineError;

use crate::models::PaperRecord;

/// Result of a catalog walk. Malformed entries are skipped and counted,
/// never fatal; page-level failures after retry exhaustion are recorded
/// so partial results stay usable.
#[derive(Debug, Default)]
pub struct CatalogBatch {
    pub records: Vec<PaperRecord>,
    pub skipped_malformed: usize,
    pub page_failures: Vec<String>,
}

/// Common interface for paper catalogs. Pagination is internal; callers
/// only ever see fully-formed records.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn search(
        &self,
        query: &str,
        year_start: i32,
        year_end: i32,
        max_results: Option<usize>,
    ) -> Result<CatalogBatch, PipelineError>;
}
