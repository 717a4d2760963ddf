use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const NO_TITLE: &str = "No title";
const NO_LINK: &str = "No link";
const NO_SUMMARY: &str = "No summary";
const UNKNOWN_AUTHOR: &str = "Unknown author";
const NO_DATE: &str = "No date";

/// One entry as read from a feed document, before normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    /// Identifier carried by the document itself (guid / atom:id)
    pub id: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    /// Publish date as displayed to readers
    pub published: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

impl FeedEntry {
    /// Stable identity key for deduplication.
    ///
    /// Priority: native id, then link, then title + publish date. Content
    /// edits under the same id or link keep the same key.
    pub fn fingerprint(&self) -> String {
        if let Some(id) = non_blank(&self.id) {
            return format!("id::{}", id);
        }
        if let Some(link) = non_blank(&self.link) {
            return format!("link::{}", link);
        }
        let title = self.title.as_deref().unwrap_or("").trim();
        let published = self.published.as_deref().unwrap_or("").trim();
        format!("tp::{}|{}", title, published)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn or_placeholder(value: Option<String>, placeholder: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| placeholder.to_string())
}

/// A normalized article handed to downstream consumers.
///
/// Only `key` outlives a poll cycle (inside the poller state).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub key: String,
    pub source: String,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub author: String,
    pub categories: Vec<String>,
    pub published: String,
    pub published_iso: Option<String>,
}

impl Article {
    pub fn from_entry(source: &str, entry: FeedEntry) -> Self {
        let key = entry.fingerprint();
        let published_iso = entry
            .published_at
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string());

        Self {
            key,
            source: source.to_string(),
            title: or_placeholder(entry.title, NO_TITLE),
            link: or_placeholder(entry.link, NO_LINK),
            summary: or_placeholder(entry.summary, NO_SUMMARY),
            author: or_placeholder(entry.author, UNKNOWN_AUTHOR),
            categories: entry
                .tags
                .into_iter()
                .filter(|t| !t.trim().is_empty())
                .collect(),
            published: or_placeholder(entry.published, NO_DATE),
            published_iso,
        }
    }

    /// Text used to look up related markets
    pub fn matching_text(&self) -> String {
        format!("{} {}", self.title, self.summary)
    }

    /// Get a preview of the summary (first N characters)
    pub fn summary_preview(&self, max_len: usize) -> String {
        let text = self.summary.trim();
        match text.char_indices().nth(max_len) {
            Some((idx, _)) => format!("{}...", &text[..idx]),
            None => text.to_string(),
        }
    }
}

/// Sort newest first; articles without a parseable date go last.
pub fn sort_newest_first(articles: &mut [Article]) {
    articles.sort_by(|a, b| {
        b.published_iso
            .as_deref()
            .unwrap_or("")
            .cmp(a.published_iso.as_deref().unwrap_or(""))
    });
}

/// HTTP caching validators remembered per feed source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheValidator {
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl CacheValidator {
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }

    /// Apply the validators of a fresh response. Headers the response did
    /// not send keep their previous value.
    pub fn updated(&self, etag: Option<String>, last_modified: Option<String>) -> Self {
        Self {
            etag: etag.or_else(|| self.etag.clone()),
            last_modified: last_modified.or_else(|| self.last_modified.clone()),
        }
    }
}
