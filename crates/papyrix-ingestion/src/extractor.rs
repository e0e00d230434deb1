//! PDF text extraction and cleaning.
//!
//! Extraction runs on in-memory bytes (the acquirer never touches
//! disk). Cleaning is a hard correctness requirement, not cosmetics:
//! Postgres rejects strings containing NUL, and a single dirty PDF must
//! not take down the run — the policy is strip-and-continue.

use std::sync::LazyLock;

use lopdf::Document;
use regex::Regex;
use tracing::debug;

use papyrix_common::PipelineError;

/// Extract cleaned plain text from PDF bytes. Encrypted or unreadable
/// documents, and documents with no extractable text layer, fail with
/// `ExtractionFailed` for this document only.
pub fn extract_text(bytes: &[u8]) -> Result<String, PipelineError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| PipelineError::ExtractionFailed(format!("unreadable PDF: {e}")))?;

    if doc.is_encrypted() {
        return Err(PipelineError::ExtractionFailed("encrypted PDF".into()));
    }

    let pages = doc.get_pages();
    let mut raw = String::new();
    for page_num in pages.keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(text) if !text.trim().is_empty() => {
                raw.push_str(&text);
                raw.push('\n');
            }
            Ok(_) => {}
            Err(e) => {
                debug!(page = page_num, error = %e, "page text extraction failed");
            }
        }
    }

    let cleaned = clean_text(&raw);
    if cleaned.is_empty() {
        return Err(PipelineError::ExtractionFailed(
            "no extractable text layer".into(),
        ));
    }
    Ok(cleaned)
}

static CONTROL_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    // Everything in C0/C1 except tab and newline (\r is rewritten
    // before this runs).
    Regex::new(r"[\u{00}-\u{08}\u{0B}\u{0C}\u{0E}-\u{1F}\u{7F}-\u{9F}]").unwrap()
});
static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" ?\n[ \n]*").unwrap());

/// Strip NUL and other control characters and collapse whitespace runs.
/// The metadata store rejects NUL outright, so this must never be
/// skipped before a database write.
pub fn clean_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let stripped = CONTROL_CHARS.replace_all(&unified, "");
    let spaced = SPACE_RUNS.replace_all(&stripped, " ");
    let collapsed = BLANK_RUNS.replace_all(&spaced, "\n");
    collapsed.trim().to_string()
}
