//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordStore trait.

use crate::output::RunReport;
use crate::parser::{AdmissionRecord, ApplicantStatus, Decision, DegreeLevel};
use crate::state::RunState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordStore, StoreError, StoreResult, UpsertOutcome};
use crate::storage::{RunRecord, StoredRecord};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// Insert-or-update in one statement
///
/// The update branch only fires when the content hash differs, so an
/// unchanged record returns no row. `source_url` is kept from the first
/// sighting unless the content changes.
const UPSERT_SQL: &str = "
INSERT INTO admission_results (
    natural_key, post_id, institution, program, degree, season,
    decision, decision_medium, decision_date, applicant_status, posted_on, comment,
    gpa, gre_verbal, gre_quant, gre_writing, gre_subject,
    source_url, content_hash, revision, first_seen_at, updated_at
) VALUES (
    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
    ?13, ?14, ?15, ?16, ?17, ?18, ?19, 1, ?20, ?20
)
ON CONFLICT(natural_key) DO UPDATE SET
    post_id = excluded.post_id,
    institution = excluded.institution,
    program = excluded.program,
    degree = excluded.degree,
    season = excluded.season,
    decision = excluded.decision,
    decision_medium = excluded.decision_medium,
    decision_date = excluded.decision_date,
    applicant_status = excluded.applicant_status,
    posted_on = excluded.posted_on,
    comment = excluded.comment,
    gpa = excluded.gpa,
    gre_verbal = excluded.gre_verbal,
    gre_quant = excluded.gre_quant,
    gre_writing = excluded.gre_writing,
    gre_subject = excluded.gre_subject,
    source_url = excluded.source_url,
    content_hash = excluded.content_hash,
    revision = admission_results.revision + 1,
    updated_at = excluded.updated_at
WHERE admission_results.content_hash <> excluded.content_hash
RETURNING revision
";

const SELECT_RECORD_SQL: &str = "
SELECT natural_key, post_id, institution, program, degree, season,
       decision, decision_medium, decision_date, applicant_status, posted_on, comment,
       gpa, gre_verbal, gre_quant, gre_writing, gre_subject,
       source_url, content_hash, revision, first_seen_at, updated_at
FROM admission_results WHERE natural_key = ?1
";

/// SQLite record store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Creates a new SqliteStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StoreError::Open)` - Failed to open database
    pub fn new(path: &Path) -> StoreResult<Self> {
        let open_error = |source| StoreError::Open {
            path: path.display().to_string(),
            source,
        };

        let conn = Connection::open(path).map_err(open_error)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )
        .map_err(open_error)?;

        initialize_schema(&conn).map_err(open_error)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StoreResult<Self> {
        let open_error = |source| StoreError::Open {
            path: ":memory:".to_string(),
            source,
        };
        let conn = Connection::open_in_memory().map_err(open_error)?;
        initialize_schema(&conn).map_err(open_error)?;
        Ok(Self { conn })
    }
}

impl RecordStore for SqliteStore {
    // ===== Records =====

    fn upsert(&mut self, record: &AdmissionRecord) -> StoreResult<UpsertOutcome> {
        let key = record.natural_key.as_str();
        let post_id = record
            .post_id
            .map(i64::try_from)
            .transpose()
            .map_err(|e| StoreError::Rejected {
                natural_key: key.to_string(),
                message: format!("post id out of range: {}", e),
            })?;
        let now = Utc::now().to_rfc3339();

        let mut stmt = self.conn.prepare_cached(UPSERT_SQL)?;
        let revision: Option<i64> = stmt
            .query_row(
                params![
                    key,
                    post_id,
                    record.institution,
                    record.program,
                    record.degree.as_ref().map(DegreeLevel::as_str),
                    record.season,
                    record.decision.as_ref().map(Decision::as_str),
                    record.decision_medium,
                    record.decision_date.map(|d| d.to_string()),
                    record.applicant_status.as_ref().map(ApplicantStatus::as_code),
                    record.posted_on.map(|d| d.to_string()),
                    record.comment,
                    record.gpa,
                    record.gre_verbal,
                    record.gre_quant,
                    record.gre_writing,
                    record.gre_subject,
                    record.source_url,
                    record.content_hash(),
                    now,
                ],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::for_record(key, e))?;

        let outcome = match revision {
            None => UpsertOutcome::Unchanged,
            Some(1) => UpsertOutcome::Inserted,
            Some(_) => UpsertOutcome::Updated,
        };
        tracing::trace!("Upserted {}: {:?}", key, outcome);

        Ok(outcome)
    }

    fn get_record(&self, natural_key: &str) -> StoreResult<Option<StoredRecord>> {
        let mut stmt = self.conn.prepare(SELECT_RECORD_SQL)?;
        let record = stmt
            .query_row(params![natural_key], row_to_stored)
            .optional()?;
        Ok(record)
    }

    fn count_records(&self) -> StoreResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM admission_results", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_by_decision(&self) -> StoreResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT COALESCE(decision, 'unknown') AS d, COUNT(*) FROM admission_results
             GROUP BY d ORDER BY COUNT(*) DESC, d ASC",
        )?;

        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    // ===== Runs =====

    fn record_run(&mut self, report: &RunReport) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (
                started_at, finished_at, status, seeds_total, seeds_attempted,
                pages_fetched, records_parsed, records_written, records_unchanged,
                error_count, skipped_count, fatal_error
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                report.started_at.to_rfc3339(),
                report.finished_at.map(|t| t.to_rfc3339()),
                report.state.to_db_string(),
                report.seeds_total as i64,
                report.seeds_attempted as i64,
                report.pages_fetched as i64,
                report.records_parsed as i64,
                report.records_written as i64,
                report.records_unchanged as i64,
                report.errors.len() as i64,
                report.skipped.len() as i64,
                report.fatal,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn recent_runs(&self, limit: usize) -> StoreResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, status, seeds_attempted, pages_fetched,
                    records_written, error_count, skipped_count, fatal_error
             FROM runs ORDER BY id DESC LIMIT ?1",
        )?;

        let runs = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    status: RunState::from_db_string(&row.get::<_, String>(3)?)
                        .unwrap_or(RunState::Failed),
                    seeds_attempted: row.get::<_, i64>(4)? as u64,
                    pages_fetched: row.get::<_, i64>(5)? as u64,
                    records_written: row.get::<_, i64>(6)? as u64,
                    error_count: row.get::<_, i64>(7)? as u64,
                    skipped_count: row.get::<_, i64>(8)? as u64,
                    fatal_error: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }
}

fn row_to_stored(row: &Row) -> rusqlite::Result<StoredRecord> {
    let date = |idx: usize| -> rusqlite::Result<Option<NaiveDate>> {
        Ok(row
            .get::<_, Option<String>>(idx)?
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()))
    };

    let record = AdmissionRecord {
        natural_key: row.get(0)?,
        post_id: row.get::<_, Option<i64>>(1)?.map(|v| v as u64),
        institution: row.get(2)?,
        program: row.get(3)?,
        degree: row
            .get::<_, Option<String>>(4)?
            .map(|s| DegreeLevel::recognize(&s).unwrap_or(DegreeLevel::Other(s))),
        season: row.get(5)?,
        decision: row
            .get::<_, Option<String>>(6)?
            .map(|s| Decision::from_db_string(&s)),
        decision_medium: row.get(7)?,
        decision_date: date(8)?,
        applicant_status: row
            .get::<_, Option<String>>(9)?
            .and_then(|s| ApplicantStatus::from_code(&s)),
        posted_on: date(10)?,
        comment: row.get(11)?,
        gpa: row.get(12)?,
        gre_verbal: row.get(13)?,
        gre_quant: row.get(14)?,
        gre_writing: row.get(15)?,
        gre_subject: row.get(16)?,
        source_url: row.get(17)?,
    };

    Ok(StoredRecord {
        record,
        content_hash: row.get(18)?,
        revision: row.get(19)?,
        first_seen_at: row.get(20)?,
        updated_at: row.get(21)?,
    })
}
