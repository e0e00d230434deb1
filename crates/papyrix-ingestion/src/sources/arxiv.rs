//! arXiv export API client.
//!
//! Endpoint: `https://export.arxiv.org/api/query` — Atom XML feed,
//! paginated with `start`/`max_results`. arXiv asks clients to pause
//! between requests, so a configurable inter-page delay is honoured.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use papyrix_common::{PipelineConfig, PipelineError, RetryPolicy};

use super::{CatalogBatch, CatalogSource};
use crate::models::PaperRecord;

const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";

pub struct ArxivClient {
    http: reqwest::Client,
    base_url: String,
    page_size: usize,
    page_delay: Duration,
    retry: RetryPolicy,
}

impl ArxivClient {
    pub fn new(cfg: &PipelineConfig) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("papyrix/0.1 (research ingestion)")
            .build()?;
        Ok(Self {
            http,
            base_url: ARXIV_API_URL.to_string(),
            page_size: cfg.page_size,
            page_delay: Duration::from_millis(cfg.catalog_page_delay_ms),
            retry: RetryPolicy::new(cfg.retry.clone()),
        })
    }

    /// Point the client at a different endpoint (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_page(&self, query: &str, start: usize) -> Result<String, PageError> {
        let params = [
            ("search_query", query),
            ("start", &start.to_string()),
            ("max_results", &self.page_size.to_string()),
        ];
        let resp = self
            .http
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| PageError::Transient(format!("request failed: {e}")))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(PageError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(PageError::Fatal(format!("HTTP {status}")));
        }
        resp.text()
            .await
            .map_err(|e| PageError::Transient(format!("body read failed: {e}")))
    }
}

#[async_trait]
impl CatalogSource for ArxivClient {
    #[instrument(skip(self))]
    async fn search(
        &self,
        query: &str,
        year_start: i32,
        year_end: i32,
        max_results: Option<usize>,
    ) -> Result<CatalogBatch, PipelineError> {
        let dated_query =
            format!("{query} AND submittedDate:[{year_start}0101 TO {year_end}1231]");
        let mut batch = CatalogBatch::default();
        let mut start = 0usize;

        loop {
            if max_results.is_some_and(|max| start >= max) {
                break;
            }

            let xml = match self
                .retry
                .run(|| self.fetch_page(&dated_query, start), PageError::is_transient)
                .await
            {
                Ok(xml) => xml,
                Err(e) if batch.records.is_empty() => {
                    return Err(PipelineError::CatalogUnavailable(e.to_string()));
                }
                Err(e) => {
                    // Partial results are still worth processing.
                    warn!(start, error = %e, "catalog page failed, keeping partial results");
                    batch.page_failures.push(format!("page at {start}: {e}"));
                    break;
                }
            };

            let page = match parse_feed(&xml) {
                Ok(page) => page,
                Err(e) if batch.records.is_empty() => {
                    return Err(PipelineError::CatalogUnavailable(e.to_string()));
                }
                Err(e) => {
                    warn!(start, error = %e, "catalog page unparsable, keeping partial results");
                    batch.page_failures.push(format!("page at {start}: {e}"));
                    break;
                }
            };
            debug!(
                start,
                n = page.records.len(),
                skipped = page.skipped,
                total = ?page.total_results,
                "catalog page parsed"
            );

            batch.skipped_malformed += page.skipped;
            let page_len = page.records.len();
            batch.records.extend(page.records);

            if page_len == 0 {
                break;
            }
            start += self.page_size;
            if page.total_results.is_some_and(|t| start as u64 >= t) {
                break;
            }
            tokio::time::sleep(self.page_delay).await;
        }

        if let Some(max) = max_results {
            batch.records.truncate(max);
        }

        info!(
            records = batch.records.len(),
            skipped = batch.skipped_malformed,
            "catalog walk complete"
        );
        Ok(batch)
    }
}

#[derive(Debug, thiserror::Error)]
enum PageError {
    #[error("{0}")]
    Transient(String),
    #[error("{0}")]
    Fatal(String),
}

impl PageError {
    fn is_transient(&self) -> bool {
        matches!(self, PageError::Transient(_))
    }
}

// ── Atom feed parsing ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(
        rename = "totalResults",
        alias = "opensearch:totalResults",
        default
    )]
    total_results: Option<u64>,
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@title")]
    title: Option<String>,
}

struct ParsedFeed {
    total_results: Option<u64>,
    records: Vec<PaperRecord>,
    skipped: usize,
}

/// Parse one Atom page into canonical records. Entries missing their
/// id, title or publication date are skipped and counted.
fn parse_feed(xml: &str) -> Result<ParsedFeed, PipelineError> {
    let feed: AtomFeed = quick_xml::de::from_str(xml)
        .map_err(|e| PipelineError::Xml(format!("arXiv feed: {e}")))?;

    let mut records = Vec::with_capacity(feed.entries.len());
    let mut skipped = 0usize;

    for entry in feed.entries {
        match canonicalize(entry) {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }

    Ok(ParsedFeed {
        total_results: feed.total_results,
        records,
        skipped,
    })
}

fn canonicalize(entry: AtomEntry) -> Option<PaperRecord> {
    let arxiv_id = entry
        .id
        .as_deref()?
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())?
        .to_string();
    let title = normalize_ws(entry.title.as_deref()?);
    if title.is_empty() {
        return None;
    }
    let year: i32 = entry.published.as_deref()?.get(..4)?.parse().ok()?;

    let pdf_url = entry
        .links
        .iter()
        .find(|l| l.title.as_deref() == Some("pdf"))
        .and_then(|l| l.href.clone())
        .unwrap_or_else(|| format!("https://arxiv.org/pdf/{arxiv_id}.pdf"));

    let authors = entry
        .authors
        .into_iter()
        .filter_map(|a| a.name)
        .map(|n| normalize_ws(&n))
        .filter(|n| !n.is_empty())
        .collect();

    Some(PaperRecord {
        arxiv_id,
        title,
        authors,
        abstract_text: entry
            .summary
            .as_deref()
            .map(normalize_ws)
            .filter(|s| !s.is_empty()),
        year,
        pdf_url,
    })
}

/// arXiv wraps titles and abstracts across lines; collapse to single
/// spaces.
fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">
  <title>ArXiv Query Results</title>
  <opensearch:totalResults>2</opensearch:totalResults>
  <entry>
    <id>http://arxiv.org/abs/2301.00001v1</id>
    <title>Explainable AI for
        Tumour Classification</title>
    <summary>We present a model.
        It works well.</summary>
    <published>2023-01-02T00:00:00Z</published>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <link href="http://arxiv.org/abs/2301.00001v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2301.00001v1" rel="related" type="application/pdf"/>
  </entry>
  <entry>
    <title>Entry with no id is malformed</title>
    <published>2022-06-01T00:00:00Z</published>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries_and_counts_malformed() {
        let feed = parse_feed(SAMPLE_FEED).unwrap();
        assert_eq!(feed.total_results, Some(2));
        assert_eq!(feed.records.len(), 1);
        assert_eq!(feed.skipped, 1);

        let rec = &feed.records[0];
        assert_eq!(rec.arxiv_id, "2301.00001v1");
        assert_eq!(rec.title, "Explainable AI for Tumour Classification");
        assert_eq!(rec.year, 2023);
        assert_eq!(rec.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(rec.pdf_url, "http://arxiv.org/pdf/2301.00001v1");
        assert_eq!(
            rec.abstract_text.as_deref(),
            Some("We present a model. It works well.")
        );
    }

    #[test]
    fn missing_pdf_link_falls_back_to_canonical_url() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/abs/2205.12345v2</id>
    <title>No explicit pdf link</title>
    <published>2022-05-20T00:00:00Z</published>
  </entry>
</feed>"#;
        let feed = parse_feed(xml).unwrap();
        assert_eq!(
            feed.records[0].pdf_url,
            "https://arxiv.org/pdf/2205.12345v2.pdf"
        );
    }

    #[test]
    fn garbage_xml_is_an_xml_error() {
        assert!(matches!(
            parse_feed("not xml at all <"),
            Err(PipelineError::Xml(_))
        ));
    }

    use papyrix_common::RetryConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve each body once, in order, then stop accepting.
    async fn spawn_page_server(pages: Vec<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for body in pages {
                let (mut stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let resp = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/atom+xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    fn paged_client(base_url: String) -> ArxivClient {
        let cfg = PipelineConfig {
            query: "q".to_string(),
            page_size: 1,
            catalog_page_delay_ms: 0,
            retry: RetryConfig {
                max_attempts: 2,
                base_delay_ms: 1,
                max_delay_ms: 2,
            },
            ..Default::default()
        };
        ArxivClient::new(&cfg).unwrap().with_base_url(base_url)
    }

    const GOOD_PAGE: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">
  <opensearch:totalResults>3</opensearch:totalResults>
  <entry>
    <id>http://arxiv.org/abs/2301.00001v1</id>
    <title>First page entry</title>
    <published>2023-01-02T00:00:00Z</published>
  </entry>
</feed>"#;

    #[tokio::test]
    async fn unparsable_page_after_results_keeps_the_partial_batch() {
        let url = spawn_page_server(vec![GOOD_PAGE, "garbage, not xml <"]).await;
        let client = paged_client(url);

        let batch = client.search("q", 2020, 2025, None).await.unwrap();

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].arxiv_id, "2301.00001v1");
        assert_eq!(batch.page_failures.len(), 1);
        assert!(batch.page_failures[0].contains("page at 1"));
    }

    #[tokio::test]
    async fn unparsable_first_page_is_catalog_unavailable() {
        let url = spawn_page_server(vec!["garbage, not xml <"]).await;
        let client = paged_client(url);

        let err = client.search("q", 2020, 2025, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::CatalogUnavailable(_)));
    }

    #[test]
    fn unparsable_year_is_skipped_not_fatal() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/abs/2205.1v1</id>
    <title>Bad date</title>
    <published>unknown</published>
  </entry>
</feed>"#;
        let feed = parse_feed(xml).unwrap();
        assert!(feed.records.is_empty());
        assert_eq!(feed.skipped, 1);
    }
}
