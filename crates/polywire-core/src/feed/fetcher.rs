use std::sync::Arc;

use super::http::{FetchResult, Fetcher, HttpFetcher};
use super::models::{sort_newest_first, Article, CacheValidator};
use super::parser::parse_entries;
use crate::config::PollerConfig;
use crate::Result;

/// Articles produced by one fetch of one source
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Newest first, capped at the requested item count
    pub articles: Vec<Article>,
    /// Validator to remember for the next fetch
    pub validator: CacheValidator,
    pub not_modified: bool,
}

impl FetchOutcome {
    fn unchanged(validator: &CacheValidator) -> Self {
        Self {
            articles: Vec::new(),
            validator: validator.clone(),
            not_modified: false,
        }
    }
}

/// Fetches a single feed source and normalizes its entries
#[derive(Clone)]
pub struct FeedFetcher {
    fetcher: Arc<dyn Fetcher>,
}

impl FeedFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Create a fetcher backed by the HTTP client
    pub fn from_config(config: &PollerConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpFetcher::new(config)?)))
    }

    /// Fetch one source. Never fails: network and parse errors are logged
    /// and degrade to an empty list with the validator left untouched.
    pub async fn fetch(
        &self,
        source: &str,
        url: &str,
        validator: &CacheValidator,
        max_items: usize,
    ) -> FetchOutcome {
        match self.try_fetch(source, url, validator, max_items).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(source = %source, "Error fetching feed from {}: {}", source, e);
                FetchOutcome::unchanged(validator)
            }
        }
    }

    async fn try_fetch(
        &self,
        source: &str,
        url: &str,
        validator: &CacheValidator,
        max_items: usize,
    ) -> Result<FetchOutcome> {
        let result = self
            .fetcher
            .fetch(url, validator.etag.as_deref(), validator.last_modified.as_deref())
            .await?;

        let (body, etag, last_modified) = match result {
            FetchResult::NotModified => {
                tracing::info!("{}: 304 Not Modified (cached)", source);
                return Ok(FetchOutcome {
                    articles: Vec::new(),
                    validator: validator.clone(),
                    not_modified: true,
                });
            }
            FetchResult::Content {
                body,
                etag,
                last_modified,
            } => (body, etag, last_modified),
        };

        let parsed = parse_entries(&body)?;
        if parsed.malformed {
            tracing::warn!("Feed for {} is malformed (may have parsing issues)", source);
        }

        let available = parsed.entries.len();
        if available < max_items {
            tracing::debug!("{}: feed provides {} entries ({} requested)", source, available, max_items);
        }

        let mut articles: Vec<Article> = parsed
            .entries
            .into_iter()
            .take(max_items)
            .map(|entry| Article::from_entry(source, entry))
            .collect();
        sort_newest_first(&mut articles);

        Ok(FetchOutcome {
            articles,
            validator: validator.updated(etag, last_modified),
            not_modified: false,
        })
    }
}
