//! Statistics generation from the results database
//!
//! This module provides functionality for extracting and displaying
//! stored-result statistics from the storage layer.

use crate::storage::{RecordStore, RunRecord};
use crate::ScrapeError;

/// Number of past runs listed by `--stats`
pub const RECENT_RUNS: usize = 5;

/// Stored results summary
#[derive(Debug, Clone)]
pub struct ResultStatistics {
    /// Total number of stored records
    pub total_records: u64,

    /// Count of records per decision, most common first
    pub by_decision: Vec<(String, u64)>,

    /// Most recent persisted runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The record store to query
///
/// # Returns
///
/// * `Ok(ResultStatistics)` - Successfully loaded statistics
/// * `Err(ScrapeError)` - Failed to query statistics
pub fn load_statistics(store: &dyn RecordStore) -> Result<ResultStatistics, ScrapeError> {
    let total_records = store.count_records()?;
    let by_decision = store.count_by_decision()?;
    let recent_runs = store.recent_runs(RECENT_RUNS)?;

    Ok(ResultStatistics {
        total_records,
        by_decision,
        recent_runs,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &ResultStatistics) {
    println!("=== Result Statistics ===\n");

    println!("Overview:");
    println!("  Total records: {}", stats.total_records);
    println!();

    if !stats.by_decision.is_empty() {
        println!("Records by Decision:");
        for (decision, count) in &stats.by_decision {
            let percentage = if stats.total_records > 0 {
                (*count as f64 / stats.total_records as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", decision, count, percentage);
        }
        println!();
    }

    if !stats.recent_runs.is_empty() {
        println!("Recent Runs:");
        for run in &stats.recent_runs {
            println!(
                "  #{} {} [{}] seeds={} pages={} written={} errors={} skipped={}",
                run.id,
                run.started_at,
                run.status,
                run.seeds_attempted,
                run.pages_fetched,
                run.records_written,
                run.error_count,
                run.skipped_count
            );
            if let Some(fatal) = &run.fatal_error {
                println!("      fatal: {}", fatal);
            }
        }
    }
}
