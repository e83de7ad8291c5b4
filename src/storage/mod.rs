//! Storage module for persisting admission results
//!
//! This module handles all database operations for the scraper, including:
//! - SQLite database initialization and schema management
//! - Idempotent record upserts keyed by natural key
//! - Run report persistence and summary queries

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{
    RecordFailure, RecordStore, StoreError, StoreResult, UpsertOutcome, WriteResult,
};

use crate::parser::AdmissionRecord;
use crate::state::RunState;

use std::path::Path;

/// Initializes or opens a record store
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Successfully initialized store
/// * `Err(StoreError)` - Failed to open the database or create the schema
pub fn open_store(path: &Path) -> StoreResult<SqliteStore> {
    SqliteStore::new(path)
}

/// A record as read back from the database
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub record: AdmissionRecord,
    pub content_hash: String,
    /// 1 on insert, incremented by every content-changing update
    pub revision: i64,
    pub first_seen_at: String,
    pub updated_at: String,
}

/// Represents a persisted run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: RunState,
    pub seeds_attempted: u64,
    pub pages_fetched: u64,
    pub records_written: u64,
    pub error_count: u64,
    pub skipped_count: u64,
    pub fatal_error: Option<String>,
}
