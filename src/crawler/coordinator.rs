//! Run coordinator - main scrape orchestration logic
//!
//! This module contains the run loop that coordinates all aspects of a
//! scrape, including:
//! - Loading the seed list
//! - Dispatching seeds to a bounded pool of workers
//! - Driving each seed through fetch, parse, and write
//! - Handling stop requests and fatal storage errors
//! - Aggregating the run report

use crate::config::{Config, ScraperConfig};
use crate::crawler::fetcher::{FetchError, HttpFetcher, PageFetcher};
use crate::output::{ErrorKind, RunReport, SeedReport};
use crate::parser::{parse_page, AdmissionRecord};
use crate::query::page_url;
use crate::seeds::{Seed, SeedSource};
use crate::state::RunState;
use crate::storage::{RecordStore, StoreError, StoreResult, WriteResult};
use crate::ScrapeError;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Record store shared by all workers
///
/// Writes are short and synchronous, so a blocking mutex is enough; it is
/// never held across an await point.
pub type SharedStore = Arc<Mutex<dyn RecordStore + Send>>;

/// Main run coordinator structure
///
/// A coordinator drives exactly one run; calling [`Coordinator::run`] a
/// second time is an invalid state transition.
pub struct Coordinator {
    config: Arc<Config>,
    fetcher: Arc<dyn PageFetcher>,
    store: SharedStore,
    state: RunState,
}

/// Everything a worker needs to process a seed
struct SeedContext {
    scraper: ScraperConfig,
    fetcher: Arc<dyn PageFetcher>,
    store: SharedStore,
    cancel: CancellationToken,
}

/// What a worker hands back to the coordinator
struct SeedOutcome {
    report: SeedReport,
    fatal: Option<StoreError>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The resolved configuration
    /// * `fetcher` - Source of raw pages
    /// * `store` - Destination for parsed records
    pub fn new(config: Config, fetcher: Arc<dyn PageFetcher>, store: SharedStore) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            store,
            state: RunState::Idle,
        }
    }

    /// Creates a coordinator that fetches over HTTP
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(ScrapeError)` - Failed to build the HTTP client
    pub fn with_http(config: Config, store: SharedStore) -> Result<Self, ScrapeError> {
        let fetcher = HttpFetcher::from_config(&config.user_agent, &config.scraper)?;
        Ok(Self::new(config, Arc::new(fetcher), store))
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) -> Result<(), ScrapeError> {
        if !self.state.can_transition_to(next) {
            return Err(ScrapeError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("Run state: {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Runs every seed to completion, failure, or skip
    ///
    /// Seeds are dispatched in order to at most `concurrency` workers and
    /// their outcomes are recorded in completion order. Once `cancel` fires
    /// or a fatal storage error occurs, no further seeds are dispatched;
    /// in-flight seeds finish their current page and the rest are marked
    /// skipped.
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - The run finished (check `exit_code` for failure)
    /// * `Err(ScrapeError::Config)` - The seed list is empty or malformed
    /// * `Err(ScrapeError)` - A worker panicked or the coordinator was reused
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<RunReport, ScrapeError> {
        let mut report = RunReport::new();

        let seeds = match SeedSource::parse(&self.config.seeds) {
            Ok(seeds) => seeds,
            Err(e) => {
                tracing::error!("Cannot start run: {}", e);
                self.transition(RunState::Failed)?;
                return Err(e.into());
            }
        };

        self.transition(RunState::Running)?;
        report.state = RunState::Running;
        report.seeds_total = seeds.len();

        let concurrency = self.config.scraper.concurrency.max(1);
        tracing::info!(
            "Starting run: {} seeds, concurrency {}, {}ms between requests",
            seeds.len(),
            concurrency,
            self.config.scraper.rate_limit_interval_ms
        );

        let ctx = Arc::new(SeedContext {
            scraper: self.config.scraper.clone(),
            fetcher: Arc::clone(&self.fetcher),
            store: Arc::clone(&self.store),
            cancel: cancel.clone(),
        });

        let mut pending = seeds.iter().cloned();
        let mut workers: JoinSet<SeedOutcome> = JoinSet::new();
        let mut fatal: Option<StoreError> = None;

        loop {
            while workers.len() < concurrency && fatal.is_none() && !cancel.is_cancelled() {
                let Some(seed) = pending.next() else {
                    break;
                };
                report.seeds_attempted += 1;
                tracing::debug!("Dispatching seed '{}'", seed);
                workers.spawn(process_seed(Arc::clone(&ctx), seed));
            }

            let Some(joined) = workers.join_next().await else {
                break;
            };

            match joined {
                Ok(outcome) => {
                    tracing::info!(
                        "Seed '{}' {}: {} pages, {} parsed, {} written",
                        outcome.report.seed,
                        outcome.report.status,
                        outcome.report.pages_fetched,
                        outcome.report.records_parsed,
                        outcome.report.records_written
                    );
                    if let Some(err) = outcome.fatal {
                        tracing::error!("Fatal storage error, stopping dispatch: {}", err);
                        fatal.get_or_insert(err);
                    }
                    report.record_seed(outcome.report);
                }
                Err(e) => {
                    workers.abort_all();
                    self.transition(RunState::Failed)?;
                    return Err(ScrapeError::Task(e.to_string()));
                }
            }
        }

        for seed in pending {
            report.record_skipped(seed);
        }
        if cancel.is_cancelled() && !report.skipped.is_empty() {
            tracing::info!(
                "Stop requested; {} seeds skipped",
                report.skipped.len()
            );
        }

        let final_state = if fatal.is_some() {
            RunState::Failed
        } else {
            RunState::Completed
        };
        report.fatal = fatal.map(|e| e.to_string());
        self.transition(final_state)?;
        report.finish(final_state);

        tracing::info!(
            "Run {}: {} of {} seeds attempted, {} pages, {} parsed, {} written, {} errors",
            final_state,
            report.seeds_attempted,
            report.seeds_total,
            report.pages_fetched,
            report.records_parsed,
            report.records_written,
            report.errors.len()
        );

        Ok(report)
    }
}

/// Drives one seed through fetch, parse, and write for each page
async fn process_seed(ctx: Arc<SeedContext>, seed: Seed) -> SeedOutcome {
    let mut report = SeedReport::new(seed.clone());
    let max_pages = ctx.scraper.max_pages_per_seed.max(1);
    let mut page = 1;

    loop {
        let url = match page_url(&seed, page, &ctx.scraper) {
            Ok(url) => url,
            Err(e) => {
                let err = FetchError::InvalidUrl {
                    seed: seed.to_string(),
                    url: ctx.scraper.base_url.clone(),
                    message: e.to_string(),
                };
                report.push_error(ErrorKind::Fetch, err.to_string());
                break;
            }
        };

        let raw = match ctx.fetcher.fetch(&seed, &url).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("{}", e);
                report.push_error(ErrorKind::Fetch, e.to_string());
                break;
            }
        };
        report.pages_fetched += 1;

        let parsed = match parse_page(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("{}", e);
                report.push_error(ErrorKind::Parse, e.to_string());
                break;
            }
        };
        report.records_parsed += parsed.records.len();

        if !parsed.records.is_empty() {
            match write_records(&ctx.store, &parsed.records) {
                Ok(result) => {
                    report.records_written += result.written();
                    report.records_unchanged += result.unchanged;
                    for failure in result.failures {
                        report.push_error(
                            ErrorKind::Store,
                            format!("{}: {}", failure.natural_key, failure.message),
                        );
                    }
                }
                Err(e) => {
                    report.push_error(ErrorKind::Store, e.to_string());
                    return SeedOutcome {
                        report,
                        fatal: Some(e),
                    };
                }
            }
        }

        let total_pages = parsed.counts.map(|c| c.pages).unwrap_or(1);
        if parsed.records.is_empty() || page >= total_pages || page >= max_pages {
            break;
        }
        if ctx.cancel.is_cancelled() {
            tracing::debug!("Stop requested; not following page {} of '{}'", page + 1, seed);
            break;
        }
        page += 1;
    }

    SeedOutcome {
        report,
        fatal: None,
    }
}

fn write_records(store: &SharedStore, records: &[AdmissionRecord]) -> StoreResult<WriteResult> {
    let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
    store.write(records)
}
