use std::path::{Path, PathBuf};

use chrono::Utc;

use super::batch::PollBatch;
use super::state::PollerState;
use crate::config::{AppConfig, FeedSource};
use crate::feed::FeedFetcher;
use crate::Result;

/// Fetch every source in order and keep only articles never emitted before.
///
/// Fingerprints are marked seen as soon as an article survives the filter, so
/// two entries sharing a key within one cycle yield a single article.
pub async fn poll_sources(
    fetcher: &FeedFetcher,
    sources: &[FeedSource],
    state: &mut PollerState,
    max_items: usize,
) -> PollBatch {
    let mut batch = PollBatch::new(Utc::now());

    for source in sources {
        let validator = state.validator(&source.name);
        let outcome = fetcher
            .fetch(&source.name, &source.url, &validator, max_items)
            .await;

        let fetched = outcome.articles.len();
        let mut fresh = Vec::new();
        for article in outcome.articles {
            if state.mark_seen(article.key.clone()) {
                fresh.push(article);
            }
        }

        tracing::info!("{}: {} new (out of {} fetched)", source.name, fresh.len(), fetched);

        state.set_validator(&source.name, outcome.validator);
        batch.push(source.name.clone(), fresh);
    }

    batch
}

/// Owns the poller state and runs poll cycles against a fixed source list
pub struct Poller {
    fetcher: FeedFetcher,
    sources: Vec<FeedSource>,
    state: PollerState,
    state_path: Option<PathBuf>,
    max_items: usize,
}

impl Poller {
    /// Create a poller with in-memory state only
    pub fn new(fetcher: FeedFetcher, sources: Vec<FeedSource>, max_items: usize) -> Self {
        Self {
            fetcher,
            sources,
            state: PollerState::default(),
            state_path: None,
            max_items,
        }
    }

    /// Load state from `path` and persist there after every cycle
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.state = PollerState::load(&path);
        self.state_path = Some(path);
        self
    }

    /// Build an HTTP-backed poller from application config
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let fetcher = FeedFetcher::from_config(&config.poller)?;
        Ok(Self::new(fetcher, config.feeds.clone(), config.poller.max_items_per_feed)
            .with_state_file(config.state_path()))
    }

    /// Run one poll cycle and persist the state once at the end
    pub async fn poll_all(&mut self) -> PollBatch {
        let batch = poll_sources(&self.fetcher, &self.sources, &mut self.state, self.max_items).await;

        if let Some(ref path) = self.state_path {
            self.state.save(path);
        }

        tracing::debug!(
            "Poll cycle finished: {} new articles, {} keys tracked",
            batch.total_new(),
            self.state.seen_count()
        );
        batch
    }

    pub fn state(&self) -> &PollerState {
        &self.state
    }

    pub fn state_path(&self) -> Option<&Path> {
        self.state_path.as_deref()
    }

    pub fn sources(&self) -> &[FeedSource] {
        &self.sources
    }
}

/// Poll every configured feed once
pub async fn single_poll(config: &AppConfig) -> Result<PollBatch> {
    let mut poller = Poller::from_config(config)?;
    Ok(poller.poll_all().await)
}
