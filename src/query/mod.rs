//! Survey search URL construction
//!
//! The survey endpoint takes four query parameters: `q` (search text),
//! `pp` (rows per page), `p` (one-indexed page) and `o` (sort column).

use crate::config::{ScraperConfig, SortColumn};
use crate::seeds::Seed;
use url::Url;

const PARAM_TEXT: &str = "q";
const PARAM_ROWS: &str = "pp";
const PARAM_PAGE: &str = "p";
const PARAM_SORT: &str = "o";

/// Builder for a survey search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    text: Option<String>,
    rows_per_page: Option<u32>,
    page: Option<u32>,
    sort_column: Option<SortColumn>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn rows_per_page(mut self, rows: u32) -> Self {
        self.rows_per_page = Some(rows);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn sort_column(mut self, column: SortColumn) -> Self {
        self.sort_column = Some(column);
        self
    }

    /// Query pairs in a fixed order; unset parameters are omitted
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(text) = &self.text {
            pairs.push((PARAM_TEXT, text.clone()));
        }
        if let Some(column) = self.sort_column {
            pairs.push((PARAM_SORT, column.as_param().to_string()));
        }
        if let Some(page) = self.page {
            pairs.push((PARAM_PAGE, page.to_string()));
        }
        if let Some(rows) = self.rows_per_page {
            pairs.push((PARAM_ROWS, rows.to_string()));
        }
        pairs
    }

    /// Appends this query to `base`, replacing any parameters it sets
    pub fn to_url(&self, base: &Url) -> Url {
        let pairs = self.to_pairs();
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| *k).collect();
        let kept: Vec<(String, String)> = base
            .query_pairs()
            .filter(|(k, _)| !keys.contains(&k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut url = base.clone();
        url.set_query(None);
        {
            let mut serializer = url.query_pairs_mut();
            for (k, v) in &kept {
                serializer.append_pair(k, v);
            }
            for (k, v) in &pairs {
                serializer.append_pair(k, v);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        url
    }
}

/// Resolves the URL of a given results page for a seed
///
/// Query seeds are sent to the configured search endpoint. URL seeds are
/// fetched as written for page 1; later pages set the `p` parameter.
pub fn page_url(seed: &Seed, page: u32, config: &ScraperConfig) -> Result<Url, url::ParseError> {
    match seed {
        Seed::Query(text) => {
            let base = Url::parse(&config.base_url)?;
            let mut query = SearchQuery::new()
                .text(text.clone())
                .sort_column(config.sort_column)
                .rows_per_page(config.rows_per_page);
            if page > 1 {
                query = query.page(page);
            }
            Ok(query.to_url(&base))
        }
        Seed::Url { url, .. } if page <= 1 => Ok(url.clone()),
        Seed::Url { url, .. } => Ok(SearchQuery::new().page(page).to_url(url)),
    }
}
