//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the scraper, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests gated by the shared rate limiter
//! - Retry with exponential backoff for transient failures
//! - Error classification

use crate::config::{ScraperConfig, UserAgentConfig};
use crate::crawler::rate_limit::RateLimiter;
use crate::seeds::Seed;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct RawPage {
    /// Seed the page was fetched for
    pub seed: Seed,

    /// Requested URL
    pub url: Url,

    /// HTTP status code (always 2xx)
    pub status: u16,

    pub fetched_at: DateTime<Utc>,

    /// Decoded response body
    pub body: String,
}

/// Errors that end a fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Seed '{seed}': invalid URL {url}: {message}")]
    InvalidUrl {
        seed: String,
        url: String,
        message: String,
    },

    #[error("Seed '{seed}': HTTP {status} from {url}")]
    Permanent {
        seed: String,
        url: String,
        status: u16,
    },

    #[error(
        "Seed '{}': giving up on {} after {} attempts (last status: {}): {}",
        .seed, .url, .attempts, status_label(.last_status), .message
    )]
    Exhausted {
        seed: String,
        url: String,
        attempts: u32,
        last_status: Option<u16>,
        message: String,
    },
}

impl FetchError {
    pub fn seed(&self) -> &str {
        match self {
            Self::InvalidUrl { seed, .. }
            | Self::Permanent { seed, .. }
            | Self::Exhausted { seed, .. } => seed,
        }
    }

    /// Last HTTP status seen, if the server answered at all
    pub fn last_status(&self) -> Option<u16> {
        match self {
            Self::InvalidUrl { .. } => None,
            Self::Permanent { status, .. } => Some(*status),
            Self::Exhausted { last_status, .. } => *last_status,
        }
    }
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}

/// Source of raw pages
///
/// The run controller only sees this trait, so tests can substitute
/// scripted fetchers for the HTTP one.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, seed: &Seed, url: &Url) -> Result<RawPage, FetchError>;
}

/// Retry schedule for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Total attempts including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`,
    /// capped at `max_backoff`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.backoff_base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `scraper` - Timeouts are taken from here
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use gradcafe_scraper::config::{ScraperConfig, UserAgentConfig};
/// use gradcafe_scraper::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), &ScraperConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    scraper: &ScraperConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(scraper.request_timeout_secs))
        .connect_timeout(Duration::from_secs(scraper.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Outcome of a single attempt that did not produce a page
enum AttemptFailure {
    Transient {
        status: Option<u16>,
        message: String,
        retry_after: Option<Duration>,
    },
    Permanent(u16),
}

/// Fetcher backed by a reqwest client and the shared rate limiter
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx | Return the page |
/// | HTTP 429 | Retry; a numeric `Retry-After` lengthens the delay |
/// | HTTP 5xx | Retry |
/// | Timeout, connection or body error | Retry |
/// | Any other status | Fail immediately |
pub struct HttpFetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(client: Client, limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self {
            client,
            limiter,
            policy,
        }
    }

    /// Builds the client, limiter, and retry policy from configuration
    pub fn from_config(
        user_agent: &UserAgentConfig,
        scraper: &ScraperConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, scraper)?;
        let limiter = Arc::new(RateLimiter::from_millis(scraper.rate_limit_interval_ms));
        Ok(Self::new(client, limiter, RetryPolicy::from_config(scraper)))
    }

    async fn attempt(&self, seed: &Seed, url: &Url) -> Result<RawPage, AttemptFailure> {
        self.limiter.acquire().await;

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                return Err(AttemptFailure::Transient {
                    status: e.status().map(|s| s.as_u16()),
                    message: describe_error(&e),
                    retry_after: None,
                })
            }
        };

        let status = response.status();
        if status.is_success() {
            return match response.text().await {
                Ok(body) => Ok(RawPage {
                    seed: seed.clone(),
                    url: url.clone(),
                    status: status.as_u16(),
                    fetched_at: Utc::now(),
                    body,
                }),
                Err(e) => Err(AttemptFailure::Transient {
                    status: Some(status.as_u16()),
                    message: format!("failed to read body: {}", e),
                    retry_after: None,
                }),
            };
        }

        if is_transient_status(status) {
            return Err(AttemptFailure::Transient {
                status: Some(status.as_u16()),
                message: format!("HTTP {}", status),
                retry_after: retry_after(response.headers()),
            });
        }

        Err(AttemptFailure::Permanent(status.as_u16()))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, seed: &Seed, url: &Url) -> Result<RawPage, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl {
                seed: seed.to_string(),
                url: url.to_string(),
                message: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let max_attempts = self.policy.max_attempts();
        let mut last_status = None;
        let mut last_message = String::new();

        for attempt in 1..=max_attempts {
            tracing::debug!("Fetching {} (attempt {}/{})", url, attempt, max_attempts);

            let retry_after = match self.attempt(seed, url).await {
                Ok(page) => {
                    tracing::debug!("Fetched {} ({} bytes)", url, page.body.len());
                    return Ok(page);
                }
                Err(AttemptFailure::Permanent(status)) => {
                    tracing::warn!("Permanent failure for {}: HTTP {}", url, status);
                    return Err(FetchError::Permanent {
                        seed: seed.to_string(),
                        url: url.to_string(),
                        status,
                    });
                }
                Err(AttemptFailure::Transient {
                    status,
                    message,
                    retry_after,
                }) => {
                    last_status = status.or(last_status);
                    last_message = message;
                    retry_after
                }
            };

            if attempt < max_attempts {
                let mut delay = self.policy.delay_for(attempt);
                if let Some(hint) = retry_after {
                    delay = delay.max(hint.min(self.policy.max_backoff));
                }
                tracing::warn!(
                    "Transient failure for {} ({}); retrying in {:?}",
                    url,
                    last_message,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        tracing::warn!("Giving up on {} after {} attempts", url, max_attempts);
        Err(FetchError::Exhausted {
            seed: seed.to_string(),
            url: url.to_string(),
            attempts: max_attempts,
            last_status,
            message: last_message,
        })
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Reads a `Retry-After` header given in seconds
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timeout: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}
