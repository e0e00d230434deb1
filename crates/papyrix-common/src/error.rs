use thiserror::Error;

/// Error taxonomy for the ingestion pipeline.
///
/// Only run-level problems surface as `PipelineError`; failures scoped
/// to one document, batch or chunk are carried as recorded outcomes in
/// the run report instead of aborting anything.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
