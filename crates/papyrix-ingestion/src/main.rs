//! Papyrix — academic paper ingestion pipeline.
//! Entry point for the ingestion binary.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use papyrix_common::Config;
use papyrix_ingestion::acquirer::HttpPdfFetcher;
use papyrix_ingestion::embedding::OllamaEmbedder;
use papyrix_ingestion::pipeline::IngestionPipeline;
use papyrix_ingestion::sources::arxiv::ArxivClient;
use papyrix_ingestion::stores::{OpenSearchIndex, PgMetadataStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("papyrix=debug,info")),
        )
        .init();

    info!("📚 Papyrix starting up...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("papyrix.toml"));
    let config = match Config::from_toml_file(&config_path) {
        Ok(c) => {
            info!(
                "Configuration loaded. Query: {:?}, years {}-{}",
                c.pipeline.query, c.pipeline.year_start, c.pipeline.year_end
            );
            c
        }
        Err(e) => {
            tracing::warn!("Could not load {}: {e}", config_path.display());
            tracing::warn!("Copy papyrix.example.toml to papyrix.toml and edit it.");
            return Ok(());
        }
    };

    info!("Connecting to Postgres...");
    let db = papyrix_db::Database::connect(&config.services.database_url).await?;
    db.init_schema().await?;
    let db = Arc::new(db);
    info!("✅ Postgres connected, schema ready.");

    let search = papyrix_search::SearchClient::new(&config.services)?;
    search.ensure_indices(config.pipeline.embed_dim).await?;
    info!("✅ Search indices ready.");

    let pipeline = IngestionPipeline::new(
        config.pipeline.clone(),
        Arc::new(ArxivClient::new(&config.pipeline)?),
        Arc::new(HttpPdfFetcher::new()?),
        Arc::new(OllamaEmbedder::new(
            &config.services.ollama_url,
            &config.pipeline.embed_model,
        )?),
        Arc::new(PgMetadataStore::new(db)),
        Arc::new(OpenSearchIndex::new(search)),
    )?;

    // Ctrl-C stops new downloads and document processing; keyed
    // upserts make the next run pick up where this one left off.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, winding the run down...");
            signal_token.cancel();
        }
    });

    let report = pipeline.run(&cancel).await?;
    info!(
        "✅ Run {} complete: {}/{} papers fully indexed, {} chunks written, {} failures.",
        report.run_id,
        report.papers_completed,
        report.papers_stored,
        report.chunks_indexed,
        report.failures.len()
    );
    if !report.failures.is_empty() {
        for failure in report.failures.iter().take(20) {
            tracing::warn!(
                stage = ?failure.stage,
                subject = %failure.subject,
                "{}",
                failure.reason
            );
        }
        if report.failures.len() > 20 {
            tracing::warn!("...and {} more failures.", report.failures.len() - 20);
        }
    }

    Ok(())
}
