use std::sync::Arc;

use anyhow::{bail, Result};

use polywire_core::index::{InMemoryVectorStore, OpenAiEmbedder};
use polywire_core::webhook::{LoggingHandler, MarketIndexHandler};
use polywire_core::{AppConfig, EventBus, WebhookServer};

use super::shutdown_on_ctrl_c;

pub async fn run(config: &AppConfig, index: bool) -> Result<()> {
    let bus = Arc::new(EventBus::new());

    let index_handler = if index {
        let Some(embedder) = OpenAiEmbedder::from_config(&config.ai) else {
            bail!("--index requires an OpenAI API key (set ai.openai_api_key or OPENAI_API_KEY)");
        };
        let handler = Arc::new(MarketIndexHandler::spawn(
            Arc::new(embedder),
            Arc::new(InMemoryVectorStore::new()),
            config.index.collection.clone(),
            config.index.max_markets,
        ));
        bus.register_handler(handler.clone());
        Some(handler)
    } else {
        bus.register_handler(Arc::new(LoggingHandler));
        None
    };

    let mut server = WebhookServer::new(config.webhook.clone(), bus);
    let addr = server.start().await?;
    println!(
        "Listening on http://{}{}. Press Ctrl+C to stop.",
        addr, config.webhook.path
    );

    let mut shutdown = shutdown_on_ctrl_c();
    let _ = shutdown.wait_for(|stop| *stop).await;

    server.stop().await;
    if let Some(handler) = index_handler {
        handler.shutdown().await;
    }

    println!("Listener stopped.");
    Ok(())
}
