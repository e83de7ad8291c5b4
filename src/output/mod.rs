//! Output module for run reports and stored-result statistics
//!
//! This module handles:
//! - Aggregating per-seed outcomes into a run report
//! - Rendering the end-of-run summary
//! - Reading summary statistics back from the database

mod report;
pub mod stats;

pub use report::{ErrorKind, RunReport, SeedError, SeedReport};
pub use stats::{load_statistics, print_statistics, ResultStatistics};
