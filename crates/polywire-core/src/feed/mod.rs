mod fetcher;
mod http;
mod models;
mod parser;

#[cfg(test)]
pub(crate) mod testing;

pub use fetcher::{FeedFetcher, FetchOutcome};
pub use http::{FetchResult, Fetcher, HttpFetcher};
pub use models::{sort_newest_first, Article, CacheValidator, FeedEntry};
pub use parser::{parse_date, parse_entries, parse_lenient, ParsedEntries};
