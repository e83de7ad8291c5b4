use serde::Deserialize;

/// Default GradCafe survey search endpoint
pub const DEFAULT_BASE_URL: &str = "https://thegradcafe.com/survey/index.php";

/// Main configuration structure for the scraper
///
/// Every section is optional in the TOML file; missing keys take the
/// defaults below, and environment overrides are applied on top.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Raw seed list (comma, newline or whitespace delimited)
    #[serde(default)]
    pub seeds: String,

    #[serde(default)]
    pub scraper: ScraperConfig,

    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seeds: String::new(),
            scraper: ScraperConfig::default(),
            user_agent: UserAgentConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Fetching and scheduling behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScraperConfig {
    /// Survey search endpoint used for query seeds
    pub base_url: String,

    /// Minimum time between the starts of any two outbound requests (milliseconds)
    pub rate_limit_interval_ms: u64,

    /// Retries after the first attempt for transient failures
    pub max_retries: u32,

    /// Maximum number of seeds processed concurrently
    pub concurrency: usize,

    /// First retry delay; doubled on every further attempt (milliseconds)
    pub backoff_base_ms: u64,

    /// Upper bound for a single retry delay (milliseconds)
    pub max_backoff_ms: u64,

    /// Whole-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// TCP connect timeout (seconds)
    pub connect_timeout_secs: u64,

    /// Rows requested per results page
    pub rows_per_page: u32,

    /// Maximum number of result pages followed for a single seed
    pub max_pages_per_seed: u32,

    /// Column the search results are sorted by
    pub sort_column: SortColumn,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit_interval_ms: 2000,
            max_retries: 3,
            concurrency: 1,
            backoff_base_ms: 1000,
            max_backoff_ms: 30_000,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            rows_per_page: 250,
            max_pages_per_seed: 1,
            sort_column: SortColumn::NotificationDate,
        }
    }
}

/// Sort column understood by the survey search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortColumn {
    Institution,
    Program,
    NotificationDate,
}

impl SortColumn {
    /// Value of the `o` query parameter
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Institution => "i",
            Self::Program => "p",
            Self::NotificationDate => "d",
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "gradcafe-scraper".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://github.com/gradcafe-scraper/gradcafe-scraper".to_string(),
            contact_email: "maintainers@example.com".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// How many per-seed errors the end-of-run summary lists
    pub error_summary_limit: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "gradcafe.db".to_string(),
            error_summary_limit: 10,
        }
    }
}
