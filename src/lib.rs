//! GradCafe scraper: a polite, idempotent admission-results collector
//!
//! This crate fetches GradCafe survey pages for a list of seed queries,
//! extracts admission result postings and upserts them into SQLite keyed by
//! a stable natural key, so repeated runs never accumulate duplicates.

pub mod config;
pub mod crawler;
pub mod output;
pub mod parser;
pub mod query;
pub mod seeds;
pub mod state;
pub mod storage;

use thiserror::Error;

pub use crawler::FetchError;
pub use parser::ParseError;
pub use storage::StoreError;

/// Main error type for scraper operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid run state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::RunState,
        to: state::RunState,
    },

    #[error("Worker task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("No seeds configured (set GRADCAFE_SEEDS or `seeds` in the config file)")]
    EmptySeeds,

    #[error("Malformed seed '{seed}': {reason}")]
    MalformedSeed { seed: String, reason: String },

    #[error("Invalid value for {var}: {message}")]
    InvalidEnv { var: String, message: String },
}

/// Result type alias for scraper operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::Coordinator;
pub use output::RunReport;
pub use parser::{parse_page, AdmissionRecord};
pub use seeds::{Seed, SeedSource};
pub use state::RunState;
