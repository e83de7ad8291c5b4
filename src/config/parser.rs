use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::str::FromStr;

/// Environment variable holding the seed list
pub const ENV_SEEDS: &str = "GRADCAFE_SEEDS";
pub const ENV_RATE_LIMIT_INTERVAL_MS: &str = "GRADCAFE_RATE_LIMIT_INTERVAL_MS";
pub const ENV_MAX_RETRIES: &str = "GRADCAFE_MAX_RETRIES";
pub const ENV_CONCURRENCY: &str = "GRADCAFE_CONCURRENCY";
pub const ENV_DATABASE_PATH: &str = "GRADCAFE_DATABASE_PATH";
pub const ENV_BASE_URL: &str = "GRADCAFE_BASE_URL";

/// Loads and parses a configuration file from the given path
///
/// The result is validated but environment overrides are not applied;
/// see [`load_config_from_env`] for the full resolution order.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Resolves the configuration: optional file, then environment overrides
///
/// The seed list itself is not checked here; an empty or malformed list
/// surfaces when the run controller builds its seed source.
pub fn load_config_from_env(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Applies `GRADCAFE_*` overrides using the given variable lookup
///
/// Empty values are treated as unset.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(seeds) = get(ENV_SEEDS) {
        config.seeds = seeds;
    }
    if let Some(value) = get(ENV_RATE_LIMIT_INTERVAL_MS) {
        config.scraper.rate_limit_interval_ms = parse_env(ENV_RATE_LIMIT_INTERVAL_MS, &value)?;
    }
    if let Some(value) = get(ENV_MAX_RETRIES) {
        config.scraper.max_retries = parse_env(ENV_MAX_RETRIES, &value)?;
    }
    if let Some(value) = get(ENV_CONCURRENCY) {
        config.scraper.concurrency = parse_env(ENV_CONCURRENCY, &value)?;
    }
    if let Some(value) = get(ENV_DATABASE_PATH) {
        config.output.database_path = value;
    }
    if let Some(value) = get(ENV_BASE_URL) {
        config.scraper.base_url = value;
    }

    Ok(())
}

fn parse_env<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnv {
            var: var.to_string(),
            message: format!("'{}': {}", value, e),
        })
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so runs can be correlated with the config they used.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SortColumn;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
seeds = "cmu, stanford"

[scraper]
rate-limit-interval-ms = 500
max-retries = 2
concurrency = 2
sort-column = "institution"

[user-agent]
crawler-name = "TestScraper"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "./test.db"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.seeds, "cmu, stanford");
        assert_eq!(config.scraper.rate_limit_interval_ms, 500);
        assert_eq!(config.scraper.max_retries, 2);
        assert_eq!(config.scraper.concurrency, 2);
        assert_eq!(config.scraper.sort_column, SortColumn::Institution);
        // Untouched keys keep their defaults
        assert_eq!(config.scraper.rows_per_page, 250);
        assert_eq!(config.user_agent.crawler_name, "TestScraper");
        assert_eq!(config.output.database_path, "./test.db");
        assert_eq!(config.output.error_summary_limit, 10);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = create_temp_config("");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.scraper.rate_limit_interval_ms, 2000);
        assert_eq!(config.scraper.max_retries, 3);
        assert_eq!(config.scraper.concurrency, 1);
        assert!(config.seeds.is_empty());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let file = create_temp_config("[scraper]\nconcurrency = 0\n");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_env_overrides_take_precedence() {
        let mut config = Config::default();
        config.seeds = "from-file".to_string();

        let vars = env(&[
            (ENV_SEEDS, "cmu, mit"),
            (ENV_RATE_LIMIT_INTERVAL_MS, "750"),
            (ENV_MAX_RETRIES, "5"),
            (ENV_CONCURRENCY, "3"),
            (ENV_DATABASE_PATH, "/tmp/results.db"),
        ]);
        apply_env_overrides(&mut config, |k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.seeds, "cmu, mit");
        assert_eq!(config.scraper.rate_limit_interval_ms, 750);
        assert_eq!(config.scraper.max_retries, 5);
        assert_eq!(config.scraper.concurrency, 3);
        assert_eq!(config.output.database_path, "/tmp/results.db");
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = Config::default();
        config.seeds = "from-file".to_string();

        let vars = env(&[(ENV_SEEDS, "   "), (ENV_MAX_RETRIES, "")]);
        apply_env_overrides(&mut config, |k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.seeds, "from-file");
        assert_eq!(config.scraper.max_retries, 3);
    }

    #[test]
    fn test_invalid_numeric_env_value() {
        let mut config = Config::default();
        let vars = env(&[(ENV_CONCURRENCY, "lots")]);
        let result = apply_env_overrides(&mut config, |k| vars.get(k).cloned());

        match result {
            Err(ConfigError::InvalidEnv { var, .. }) => assert_eq!(var, ENV_CONCURRENCY),
            other => panic!("expected InvalidEnv, got {:?}", other),
        }
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }
}
