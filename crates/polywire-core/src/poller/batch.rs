use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::feed::Article;

/// New articles found for one source during a poll cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceBatch {
    pub source: String,
    pub articles: Vec<Article>,
}

/// Result of one poll cycle.
///
/// Sources appear in configuration order. A source with nothing new is still
/// present with an empty article list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollBatch {
    pub polled_at: DateTime<Utc>,
    pub sources: Vec<SourceBatch>,
}

impl PollBatch {
    pub fn new(polled_at: DateTime<Utc>) -> Self {
        Self {
            polled_at,
            sources: Vec::new(),
        }
    }

    pub fn push(&mut self, source: impl Into<String>, articles: Vec<Article>) {
        self.sources.push(SourceBatch {
            source: source.into(),
            articles,
        });
    }

    /// New articles for a source, or None if the source was not polled
    pub fn get(&self, source: &str) -> Option<&[Article]> {
        self.sources
            .iter()
            .find(|s| s.source == source)
            .map(|s| s.articles.as_slice())
    }

    pub fn total_new(&self) -> usize {
        self.sources.iter().map(|s| s.articles.len()).sum()
    }

    /// True when no source produced anything new
    pub fn is_empty(&self) -> bool {
        self.total_new() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Article])> {
        self.sources
            .iter()
            .map(|s| (s.source.as_str(), s.articles.as_slice()))
    }
}
