use std::sync::Arc;

use anyhow::{Context, Result};

use polywire_core::index::{InMemoryVectorStore, MarketMatcher, OpenAiEmbedder};
use polywire_core::webhook::MarketIndexHandler;
use polywire_core::{AppConfig, EventBus, PollService, Poller, WebhookServer};

use super::shutdown_on_ctrl_c;
use super::watch::PrintBatchHandler;

pub async fn run(config: &AppConfig) -> Result<()> {
    let embedder = OpenAiEmbedder::from_config(&config.ai)
        .context("`run` requires an OpenAI API key (set ai.openai_api_key or OPENAI_API_KEY)")?;
    let embedder = Arc::new(embedder);
    let store = Arc::new(InMemoryVectorStore::new());
    let collection = config.index.collection.clone();

    // Market events keep the index current
    let index_handler = Arc::new(MarketIndexHandler::spawn(
        embedder.clone(),
        store.clone(),
        collection.clone(),
        config.index.max_markets,
    ));
    let bus = Arc::new(EventBus::new());
    bus.register_handler(index_handler.clone());

    let mut server = WebhookServer::new(config.webhook.clone(), bus);
    let addr = server.start().await?;

    // News is matched against whatever the index holds at poll time
    let matcher = MarketMatcher::new(embedder, store, collection);
    let handler = PrintBatchHandler::new(false).with_matcher(matcher, config.ai.top_k);
    let poller = Poller::from_config(config)?;
    let service = PollService::new(poller, config.poll_interval(), Arc::new(handler));

    println!("Listening for market events on http://{}{}", addr, config.webhook.path);
    println!(
        "Polling {} feeds every {} seconds. Press Ctrl+C to stop.",
        config.feeds.len(),
        config.poller.interval_secs
    );

    service.run(shutdown_on_ctrl_c()).await;

    server.stop().await;
    index_handler.shutdown().await;

    println!("Stopped.");
    Ok(())
}
