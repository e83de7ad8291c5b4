//! Storage traits and error types
//!
//! This module defines the trait interface for record stores and the
//! associated error and result types.

use crate::output::RunReport;
use crate::parser::AdmissionRecord;
use crate::storage::{RunRecord, StoredRecord};
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to open database {path}: {source}")]
    Open {
        path: String,
        source: rusqlite::Error,
    },

    #[error("Database connection error: {0}")]
    Connection(#[from] rusqlite::Error),

    #[error("Constraint violation for record {natural_key}: {message}")]
    Constraint { natural_key: String, message: String },

    #[error("Record {natural_key} rejected: {message}")]
    Rejected { natural_key: String, message: String },
}

impl StoreError {
    /// Connection-level errors end the run: no later write can succeed
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Open { .. } | Self::Connection(_))
    }

    /// Classifies an error raised while writing one record
    pub fn for_record(natural_key: &str, err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref e, ref msg)
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Self::Constraint {
                    natural_key: natural_key.to_string(),
                    message: msg.clone().unwrap_or_else(|| e.to_string()),
                }
            }
            rusqlite::Error::ToSqlConversionFailure(_)
            | rusqlite::Error::IntegralValueOutOfRange(_, _)
            | rusqlite::Error::InvalidParameterCount(_, _) => Self::Rejected {
                natural_key: natural_key.to_string(),
                message: err.to_string(),
            },
            other => Self::Connection(other),
        }
    }
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// What an upsert did to the stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Same natural key and identical content; nothing was written
    Unchanged,
}

/// A record that could not be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub natural_key: String,
    pub message: String,
}

/// Aggregate outcome of writing a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteResult {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failures: Vec<RecordFailure>,
}

impl WriteResult {
    /// Rows that were inserted or changed
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Trait for record store implementations
///
/// Implementations must make each `upsert` atomic: a reader never sees a
/// half-written record.
pub trait RecordStore {
    // ===== Records =====

    /// Inserts the record, or updates the stored row with the same natural
    /// key when any field differs
    fn upsert(&mut self, record: &AdmissionRecord) -> StoreResult<UpsertOutcome>;

    /// Upserts a batch, collecting per-record failures
    ///
    /// Returns `Err` only for a fatal (connection-level) error, in which case
    /// the remaining records are not attempted.
    fn write(&mut self, records: &[AdmissionRecord]) -> StoreResult<WriteResult> {
        let mut result = WriteResult::default();

        for record in records {
            match self.upsert(record) {
                Ok(UpsertOutcome::Inserted) => result.inserted += 1,
                Ok(UpsertOutcome::Updated) => result.updated += 1,
                Ok(UpsertOutcome::Unchanged) => result.unchanged += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!("Failed to write record {}: {}", record.natural_key, e);
                    result.failures.push(RecordFailure {
                        natural_key: record.natural_key.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(result)
    }

    /// Gets a stored record by natural key
    fn get_record(&self, natural_key: &str) -> StoreResult<Option<StoredRecord>>;

    /// Counts stored records
    fn count_records(&self) -> StoreResult<u64>;

    /// Counts stored records per decision (`unknown` for missing decisions)
    fn count_by_decision(&self) -> StoreResult<Vec<(String, u64)>>;

    // ===== Runs =====

    /// Persists a finished run report, returning its id
    fn record_run(&mut self, report: &RunReport) -> StoreResult<i64>;

    /// Most recent persisted runs, newest first
    fn recent_runs(&self, limit: usize) -> StoreResult<Vec<RunRecord>>;
}
