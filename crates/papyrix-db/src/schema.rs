//! Schema bootstrap statements, executed in order by
//! [`Database::init_schema`](crate::Database::init_schema).

pub const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS papers (
        arxiv_id      TEXT PRIMARY KEY,
        title         TEXT NOT NULL,
        authors       JSONB NOT NULL DEFAULT '[]'::jsonb,
        abstract_text TEXT,
        year          INTEGER NOT NULL,
        pdf_url       TEXT NOT NULL,
        processed     BOOLEAN NOT NULL DEFAULT FALSE,
        ingested_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chunks (
        paper_id     TEXT NOT NULL REFERENCES papers (arxiv_id),
        chunk_index  INTEGER NOT NULL,
        content      TEXT NOT NULL,
        start_offset INTEGER NOT NULL,
        end_offset   INTEGER NOT NULL,
        created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (paper_id, chunk_index)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_papers_year ON papers (year)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_chunks_paper ON chunks (paper_id)
    "#,
];
