use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use polywire_core::index::MarketMatcher;
use polywire_core::poller::BatchHandler;
use polywire_core::{AppConfig, PollBatch, PollService, Poller};

use super::display::{format_headlines, format_matches, MAX_PER_SOURCE};
use super::shutdown_on_ctrl_c;

/// Prints each batch, optionally with the closest markets per article
pub struct PrintBatchHandler {
    verbose: bool,
    matcher: Option<(MarketMatcher, usize)>,
}

impl PrintBatchHandler {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            matcher: None,
        }
    }

    pub fn with_matcher(mut self, matcher: MarketMatcher, top_k: usize) -> Self {
        self.matcher = Some((matcher, top_k));
        self
    }
}

#[async_trait]
impl BatchHandler for PrintBatchHandler {
    async fn handle(&self, batch: Arc<PollBatch>) -> polywire_core::Result<()> {
        if batch.is_empty() {
            println!("[{}] No new articles.", batch.polled_at.format("%Y-%m-%d %H:%M:%S"));
            return Ok(());
        }

        match self.matcher {
            Some((ref matcher, top_k)) => {
                let matches = matcher.match_batch(&batch, top_k).await;
                println!("{}", format_matches(&matches));
            }
            None => println!("{}", format_headlines(&batch, MAX_PER_SOURCE, self.verbose)),
        }
        Ok(())
    }
}

pub async fn run(config: &AppConfig, interval_secs: Option<u64>, verbose: bool) -> Result<()> {
    let interval = interval_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.poll_interval());

    let poller = Poller::from_config(config)?;
    let service = PollService::new(poller, interval, Arc::new(PrintBatchHandler::new(verbose)));

    println!(
        "Watching {} feeds every {} seconds. Press Ctrl+C to stop.",
        config.feeds.len(),
        interval.as_secs()
    );

    let poller = service.run(shutdown_on_ctrl_c()).await;

    println!("Stopped. {} articles seen so far.", poller.state().seen_count());
    Ok(())
}
