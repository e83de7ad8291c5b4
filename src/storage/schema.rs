//! Database schema definitions
//!
//! Results are keyed by natural key and carry the dates they describe plus a
//! last-updated timestamp, so the table can be queried as a time series.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per admission result posting
CREATE TABLE IF NOT EXISTS admission_results (
    natural_key TEXT PRIMARY KEY CHECK (length(natural_key) > 0),
    post_id INTEGER,
    institution TEXT,
    program TEXT,
    degree TEXT,
    season TEXT,
    decision TEXT,
    decision_medium TEXT,
    decision_date TEXT,
    applicant_status TEXT,
    posted_on TEXT,
    comment TEXT,
    gpa REAL,
    gre_verbal REAL,
    gre_quant REAL,
    gre_writing REAL,
    gre_subject TEXT,
    source_url TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    revision INTEGER NOT NULL DEFAULT 1,
    first_seen_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_results_decision_date ON admission_results(decision_date);
CREATE INDEX IF NOT EXISTS idx_results_posted_on ON admission_results(posted_on);
CREATE INDEX IF NOT EXISTS idx_results_institution ON admission_results(institution);

-- Run reports, written only on request
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL,
    seeds_total INTEGER NOT NULL,
    seeds_attempted INTEGER NOT NULL,
    pages_fetched INTEGER NOT NULL,
    records_parsed INTEGER NOT NULL,
    records_written INTEGER NOT NULL,
    records_unchanged INTEGER NOT NULL,
    error_count INTEGER NOT NULL,
    skipped_count INTEGER NOT NULL,
    fatal_error TEXT
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
