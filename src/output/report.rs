//! Run report
//!
//! Aggregates per-seed outcomes into the summary returned by a run.

use crate::seeds::Seed;
use crate::state::{RunState, SeedStatus};
use chrono::{DateTime, Utc};
use std::fmt;
use std::fmt::Write as _;

/// Pipeline stage an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Fetch,
    Parse,
    Store,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Parse => "parse",
            Self::Store => "store",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One error attributed to a seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedError {
    pub seed: String,
    pub kind: ErrorKind,
    pub detail: String,
}

/// Outcome of processing one seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub seed: Seed,
    pub status: SeedStatus,
    pub pages_fetched: usize,
    pub records_parsed: usize,
    /// Inserted plus updated
    pub records_written: usize,
    pub records_unchanged: usize,
    pub errors: Vec<SeedError>,
}

impl SeedReport {
    pub fn new(seed: Seed) -> Self {
        Self {
            seed,
            status: SeedStatus::Completed,
            pages_fetched: 0,
            records_parsed: 0,
            records_written: 0,
            records_unchanged: 0,
            errors: Vec::new(),
        }
    }

    pub fn skipped(seed: Seed) -> Self {
        Self {
            status: SeedStatus::Skipped,
            ..Self::new(seed)
        }
    }

    pub fn push_error(&mut self, kind: ErrorKind, detail: impl Into<String>) {
        self.errors.push(SeedError {
            seed: self.seed.to_string(),
            kind,
            detail: detail.into(),
        });
        self.status = SeedStatus::Failed;
    }
}

/// Summary of a whole run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub seeds_total: usize,
    pub seeds_attempted: usize,
    pub pages_fetched: usize,
    pub records_parsed: usize,
    pub records_written: usize,
    pub records_unchanged: usize,
    /// Per-seed outcomes in completion order, skipped seeds last
    pub seeds: Vec<SeedReport>,
    pub errors: Vec<SeedError>,
    pub skipped: Vec<Seed>,
    /// Set when an unrecoverable error ended the run
    pub fatal: Option<String>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            started_at: Utc::now(),
            finished_at: None,
            seeds_total: 0,
            seeds_attempted: 0,
            pages_fetched: 0,
            records_parsed: 0,
            records_written: 0,
            records_unchanged: 0,
            seeds: Vec::new(),
            errors: Vec::new(),
            skipped: Vec::new(),
            fatal: None,
        }
    }

    /// Folds a finished seed into the totals
    pub fn record_seed(&mut self, seed: SeedReport) {
        self.pages_fetched += seed.pages_fetched;
        self.records_parsed += seed.records_parsed;
        self.records_written += seed.records_written;
        self.records_unchanged += seed.records_unchanged;
        self.errors.extend(seed.errors.iter().cloned());
        self.seeds.push(seed);
    }

    /// Marks a seed that was never dispatched
    pub fn record_skipped(&mut self, seed: Seed) {
        self.skipped.push(seed.clone());
        self.seeds.push(SeedReport::skipped(seed));
    }

    pub fn finish(&mut self, state: RunState) {
        self.state = state;
        self.finished_at = Some(Utc::now());
    }

    pub fn status_of(&self, seed: &Seed) -> Option<SeedStatus> {
        self.seeds.iter().find(|s| &s.seed == seed).map(|s| s.status)
    }

    /// Process exit code: 1 if the run failed, 0 otherwise
    ///
    /// Per-seed errors alone never fail a run.
    pub fn exit_code(&self) -> u8 {
        if self.fatal.is_some() || self.state == RunState::Failed {
            1
        } else {
            0
        }
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }

    /// Human-readable summary listing at most `error_limit` errors
    pub fn render_summary(&self, error_limit: usize) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "=== Run Summary ({}) ===", self.state);
        let _ = writeln!(
            out,
            "  Seeds: {} attempted of {} ({} skipped)",
            self.seeds_attempted,
            self.seeds_total,
            self.skipped.len()
        );
        let _ = writeln!(out, "  Pages fetched: {}", self.pages_fetched);
        let _ = writeln!(out, "  Records parsed: {}", self.records_parsed);
        let _ = writeln!(
            out,
            "  Records written: {} ({} unchanged)",
            self.records_written, self.records_unchanged
        );
        if let Some(secs) = self.duration_seconds() {
            let _ = writeln!(out, "  Duration: {}s", secs);
        }

        if let Some(fatal) = &self.fatal {
            let _ = writeln!(out, "  Fatal: {}", fatal);
        }

        if !self.errors.is_empty() {
            let _ = writeln!(out, "\nErrors ({}):", self.errors.len());
            for error in self.errors.iter().take(error_limit) {
                let _ = writeln!(out, "  [{}] {}: {}", error.kind, error.seed, error.detail);
            }
            if self.errors.len() > error_limit {
                let _ = writeln!(out, "  ... and {} more", self.errors.len() - error_limit);
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(text: &str) -> Seed {
        Seed::Query(text.to_string())
    }

    #[test]
    fn test_record_seed_aggregates() {
        let mut report = RunReport::new();

        let mut a = SeedReport::new(seed("a"));
        a.pages_fetched = 2;
        a.records_parsed = 5;
        a.records_written = 4;
        a.records_unchanged = 1;

        let mut b = SeedReport::new(seed("b"));
        b.push_error(ErrorKind::Fetch, "HTTP 404");

        report.record_seed(a);
        report.record_seed(b);
        report.record_skipped(seed("c"));

        assert_eq!(report.pages_fetched, 2);
        assert_eq!(report.records_parsed, 5);
        assert_eq!(report.records_written, 4);
        assert_eq!(report.records_unchanged, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].seed, "b");
        assert_eq!(report.status_of(&seed("a")), Some(SeedStatus::Completed));
        assert_eq!(report.status_of(&seed("b")), Some(SeedStatus::Failed));
        assert_eq!(report.status_of(&seed("c")), Some(SeedStatus::Skipped));
        assert_eq!(report.skipped, vec![seed("c")]);
    }

    #[test]
    fn test_exit_code() {
        let mut report = RunReport::new();
        report.record_seed({
            let mut s = SeedReport::new(seed("a"));
            s.push_error(ErrorKind::Parse, "unrecognized");
            s
        });
        report.finish(RunState::Completed);
        assert_eq!(report.exit_code(), 0);

        report.fatal = Some("disk I/O error".to_string());
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_summary_limits_errors() {
        let mut report = RunReport::new();
        let mut s = SeedReport::new(seed("a"));
        for i in 0..5 {
            s.push_error(ErrorKind::Store, format!("failure {}", i));
        }
        report.record_seed(s);
        report.finish(RunState::Completed);

        let summary = report.render_summary(2);
        assert!(summary.contains("Errors (5):"));
        assert!(summary.contains("failure 0"));
        assert!(summary.contains("failure 1"));
        assert!(!summary.contains("failure 2"));
        assert!(summary.contains("... and 3 more"));
    }
}
