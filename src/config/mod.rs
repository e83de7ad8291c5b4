//! Configuration module for the scraper
//!
//! Configuration is resolved in three layers: built-in defaults, an optional
//! TOML file, then `GRADCAFE_*` environment variables.
//!
//! # Example
//!
//! ```no_run
//! use gradcafe_scraper::config::load_config_from_env;
//! use std::path::Path;
//!
//! let config = load_config_from_env(Some(Path::new("scraper.toml"))).unwrap();
//! println!("Politeness interval: {}ms", config.scraper.rate_limit_interval_ms);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, OutputConfig, ScraperConfig, SortColumn, UserAgentConfig, DEFAULT_BASE_URL,
};

pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_from_env, ENV_BASE_URL,
    ENV_CONCURRENCY, ENV_DATABASE_PATH, ENV_MAX_RETRIES, ENV_RATE_LIMIT_INTERVAL_MS, ENV_SEEDS,
};
pub use validation::validate;
