use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use super::http::{FetchResult, Fetcher};
use crate::Result;

/// Serves canned responses and records the validators it was sent
pub struct StubFetcher {
    pub responses: Mutex<Vec<Result<FetchResult>>>,
    pub requests: Mutex<Vec<(String, Option<String>, Option<String>)>>,
}

impl StubFetcher {
    pub fn new(responses: Vec<Result<FetchResult>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<FetchResult> {
        self.requests.lock().unwrap().push((
            url.to_string(),
            etag.map(String::from),
            last_modified.map(String::from),
        ));
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(FetchResult::NotModified);
        }
        responses.remove(0)
    }
}

pub fn rss(items: &[(&str, &str)]) -> FetchResult {
    let body: String = items
        .iter()
        .map(|(guid, date)| {
            format!(
                "<item><title>Title {guid}</title><guid>{guid}</guid><link>https://example.com/{guid}</link><pubDate>{date}</pubDate></item>"
            )
        })
        .collect();
    FetchResult::Content {
        body: Bytes::from(format!(
            "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>T</title>{body}</channel></rss>"
        )),
        etag: Some("\"etag-1\"".to_string()),
        last_modified: None,
    }
}
