//! Shared types for the papyrix ingestion pipeline: error taxonomy,
//! retry/backoff policy and run configuration.

pub mod config;
pub mod error;
pub mod retry;

pub use config::{Config, PipelineConfig, ServicesConfig};
pub use error::{PipelineError, Result};
pub use retry::{RetryConfig, RetryPolicy};
