//! Crawler module for fetching and processing survey pages
//!
//! This module contains the core scraping logic, including:
//! - HTTP fetching with retry and backoff
//! - Global request rate limiting
//! - Overall run coordination

mod coordinator;
mod fetcher;
mod rate_limit;

pub use coordinator::{Coordinator, SharedStore};
pub use fetcher::{build_http_client, FetchError, HttpFetcher, PageFetcher, RawPage, RetryPolicy};
pub use rate_limit::{next_start, RateLimiter};

use crate::config::Config;
use crate::output::RunReport;
use crate::storage::open_store;
use crate::ScrapeError;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Runs a complete scrape against the configured database
///
/// This is the main entry point for a run. It will:
/// 1. Open the record store
/// 2. Build the HTTP fetcher
/// 3. Process every seed
/// 4. Return the run report
///
/// # Arguments
///
/// * `config` - The resolved configuration
/// * `cancel` - Fires to stop dispatching new seeds
///
/// # Returns
///
/// * `Ok(RunReport)` - The run finished
/// * `Err(ScrapeError)` - The run could not start
pub async fn scrape(config: Config, cancel: CancellationToken) -> Result<RunReport, ScrapeError> {
    let store = open_store(Path::new(&config.output.database_path))?;
    let store: SharedStore = Arc::new(Mutex::new(store));
    let mut coordinator = Coordinator::with_http(config, store)?;
    coordinator.run(cancel).await
}
