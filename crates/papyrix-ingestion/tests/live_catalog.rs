//! Live arXiv catalog test. Needs network; run explicitly:
//!   cargo test -p papyrix-ingestion --test live_catalog -- --ignored

use papyrix_common::PipelineConfig;
use papyrix_ingestion::sources::arxiv::ArxivClient;
use papyrix_ingestion::sources::CatalogSource;

#[tokio::test]
#[ignore]
async fn fetches_real_records_for_a_common_query() {
    let cfg = PipelineConfig {
        query: "machine learning".to_string(),
        page_size: 5,
        max_results: Some(5),
        catalog_page_delay_ms: 3_000,
        ..Default::default()
    };
    let client = ArxivClient::new(&cfg).unwrap();
    let batch = client
        .search(&cfg.query, 2000, 2030, cfg.max_results)
        .await
        .unwrap();

    assert!(!batch.records.is_empty());
    assert!(batch.records.len() <= 5);
    for record in &batch.records {
        assert!(!record.arxiv_id.is_empty());
        assert!(!record.title.is_empty());
        assert!(record.pdf_url.starts_with("http"));
        assert!(record.year >= 1991);
    }
}
