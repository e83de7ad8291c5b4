//! GradCafe scraper main entry point
//!
//! This is the command-line interface for the GradCafe admission-results scraper.

use clap::Parser;
use gradcafe_scraper::config::{compute_config_hash, load_config_from_env, Config};
use gradcafe_scraper::crawler::{Coordinator, SharedStore};
use gradcafe_scraper::output::{load_statistics, print_statistics};
use gradcafe_scraper::query::page_url;
use gradcafe_scraper::storage::{open_store, RecordStore};
use gradcafe_scraper::{ScrapeError, SeedSource};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Exit code for configuration errors
const EXIT_CONFIG: u8 = 2;

/// Exit code for fatal storage or initialization errors
const EXIT_FATAL: u8 = 1;

/// GradCafe scraper: a polite admission-results collector
///
/// Fetches GradCafe survey results for each seed, one request at a time per
/// politeness interval, and upserts them into SQLite so repeated runs never
/// create duplicates.
#[derive(Parser, Debug)]
#[command(name = "gradcafe-scraper")]
#[command(version)]
#[command(about = "A polite GradCafe admission-results scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seed list, overriding GRADCAFE_SEEDS and the config file
    #[arg(long, value_name = "LIST")]
    seeds: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be fetched without fetching
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Persist the run report in the database
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    record_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // A missing .env file is fine
    let dotenv = dotenvy::dotenv();

    setup_logging(cli.verbose, cli.quiet);

    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let result = if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_scrape(config, cli.record_run).await
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e @ ScrapeError::Config(_)) => {
            tracing::error!("{}", e);
            ExitCode::from(EXIT_CONFIG)
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gradcafe_scraper=info,warn"),
            1 => EnvFilter::new("gradcafe_scraper=debug,info"),
            2 => EnvFilter::new("gradcafe_scraper=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Defaults, then the config file, then the environment, then `--seeds`
fn resolve_config(cli: &Cli) -> Result<Config, ScrapeError> {
    if let Some(path) = &cli.config {
        tracing::info!("Loading configuration from: {}", path.display());
        let hash = compute_config_hash(path)?;
        tracing::info!("Configuration hash: {}", hash);
    }

    let mut config = load_config_from_env(cli.config.as_deref())?;
    if let Some(seeds) = &cli.seeds {
        config.seeds = seeds.clone();
    }
    Ok(config)
}

/// Handles the --dry-run mode: validates config and shows what would be fetched
fn handle_dry_run(config: &Config) -> Result<u8, ScrapeError> {
    let seeds = SeedSource::parse(&config.seeds)?;

    println!("=== GradCafe Scraper Dry Run ===\n");

    println!("Scraper Configuration:");
    println!("  Base URL: {}", config.scraper.base_url);
    println!(
        "  Rate limit interval: {}ms",
        config.scraper.rate_limit_interval_ms
    );
    println!("  Max retries: {}", config.scraper.max_retries);
    println!("  Concurrency: {}", config.scraper.concurrency);
    println!("  Rows per page: {}", config.scraper.rows_per_page);
    println!("  Max pages per seed: {}", config.scraper.max_pages_per_seed);

    println!("\nUser Agent: {}", config.user_agent.header_value());
    println!("Database: {}", config.output.database_path);

    println!("\nSeeds ({}):", seeds.len());
    for seed in &seeds {
        match page_url(seed, 1, &config.scraper) {
            Ok(url) => println!("  - {} -> {}", seed, url),
            Err(e) => println!("  - {} (invalid URL: {})", seed, e),
        }
    }

    println!("\n✓ Configuration is valid");
    Ok(0)
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<u8, ScrapeError> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_store(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(0)
}

/// Handles the main scrape operation
async fn handle_scrape(config: Config, record_run: bool) -> Result<u8, ScrapeError> {
    let error_limit = config.output.error_summary_limit;

    let store = Arc::new(Mutex::new(open_store(Path::new(
        &config.output.database_path,
    ))?));
    let shared: SharedStore = store.clone();
    let mut coordinator = Coordinator::with_http(config, shared)?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing in-flight seeds");
            signal_token.cancel();
        }
    });

    let report = coordinator.run(cancel).await?;
    println!("{}", report.render_summary(error_limit));

    if record_run {
        let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
        match store.record_run(&report) {
            Ok(id) => tracing::info!("Recorded run #{}", id),
            Err(e) => tracing::warn!("Failed to record run: {}", e),
        }
    }

    Ok(report.exit_code())
}
