//! Seed source
//!
//! Turns the configured seed list into an ordered, de-duplicated sequence of
//! [`Seed`] values. A seed is either a free-text survey search or an absolute
//! URL of a results page.

use crate::ConfigError;
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// Longest seed token accepted
const MAX_SEED_LEN: usize = 512;

/// One unit of scraping work
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Seed {
    /// Free-text survey search (e.g. `cmu`, `computer science phd`)
    Query(String),
    /// Absolute http(s) URL of a results page, with the token as configured
    Url { raw: String, url: Url },
}

impl Seed {
    /// Parses a single trimmed, non-empty token
    pub fn parse(token: &str) -> Result<Self, ConfigError> {
        let malformed = |reason: &str| ConfigError::MalformedSeed {
            seed: token.to_string(),
            reason: reason.to_string(),
        };

        if token.is_empty() {
            return Err(malformed("seed is empty"));
        }
        if token.chars().count() > MAX_SEED_LEN {
            return Err(malformed("seed is longer than 512 characters"));
        }
        if token.chars().any(char::is_control) {
            return Err(malformed("seed contains control characters"));
        }

        let lower = token.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(token).map_err(|e| malformed(&e.to_string()))?;
            if url.host_str().is_none() {
                return Err(malformed("URL has no host"));
            }
            return Ok(Self::Url {
                raw: token.to_string(),
                url,
            });
        }

        Ok(Self::Query(token.to_string()))
    }

    /// The seed as written in the configuration
    pub fn as_str(&self) -> &str {
        match self {
            Self::Query(text) => text,
            Self::Url { raw, .. } => raw,
        }
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, finite, restartable list of seeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSource {
    seeds: Vec<Seed>,
}

impl SeedSource {
    /// Parses a delimited seed list
    ///
    /// If the value contains a comma or newline, tokens are split on those
    /// so multi-word searches survive; otherwise on whitespace. Empty tokens
    /// are ignored and repeated tokens keep only their first occurrence.
    ///
    /// # Errors
    ///
    /// * `ConfigError::EmptySeeds` - no tokens at all
    /// * `ConfigError::MalformedSeed` - a token is not a usable seed
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let tokens: Vec<&str> = if raw.contains(',') || raw.contains('\n') {
            raw.split([',', '\n', '\r']).collect()
        } else {
            raw.split_whitespace().collect()
        };

        let mut seen = HashSet::new();
        let mut seeds = Vec::new();
        for token in tokens.into_iter().map(str::trim).filter(|t| !t.is_empty()) {
            if !seen.insert(token) {
                continue;
            }
            seeds.push(Seed::parse(token)?);
        }

        if seeds.is_empty() {
            return Err(ConfigError::EmptySeeds);
        }

        Ok(Self { seeds })
    }

    /// Iterates the seeds in configuration order; may be called repeatedly
    pub fn iter(&self) -> std::slice::Iter<'_, Seed> {
        self.seeds.iter()
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }
}

impl<'a> IntoIterator for &'a SeedSource {
    type Item = &'a Seed;
    type IntoIter = std::slice::Iter<'a, Seed>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
