// Market events flow into the index, and polled articles are matched against it.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::json;
use tower::ServiceExt as _;

use polywire_core::feed::{Article, FeedEntry};
use polywire_core::index::{market_point_id, Embedder, InMemoryVectorStore, MarketMatcher};
use polywire_core::webhook::{router, EventBus, MarketIndexHandler};
use polywire_core::{PollBatch, Result};

const TOPICS: [&str; 4] = ["fed", "bitcoin", "election", "storm"];

/// Bag-of-topics embedding
struct TopicEmbedder;

#[async_trait]
impl Embedder for TopicEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_lowercase();
        Ok(TOPICS
            .iter()
            .map(|topic| if text.contains(topic) { 1.0 } else { 0.05 })
            .collect())
    }
}

async fn post_event(bus: Arc<EventBus>, payload: serde_json::Value) -> StatusCode {
    let req = Request::builder()
        .method("POST")
        .uri("/market-event")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build request");
    router(bus, "/market-event")
        .oneshot(req)
        .await
        .expect("oneshot")
        .status()
}

fn article(title: &str) -> Article {
    Article::from_entry(
        "Wire",
        FeedEntry {
            id: Some(title.to_string()),
            title: Some(title.to_string()),
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn events_update_index_and_articles_match() {
    let embedder = Arc::new(TopicEmbedder);
    let store = Arc::new(InMemoryVectorStore::new());
    let handler = Arc::new(MarketIndexHandler::spawn(embedder.clone(), store.clone(), "markets", None));
    let bus = Arc::new(EventBus::new());
    bus.register_handler(handler.clone());

    let added = json!({
        "event": "market_added",
        "data": {"markets": [
            {"condition_id": "rates", "question": "Will the Fed cut rates in March?", "description": "", "tokens": ["YES", "NO"]},
            {"condition_id": "btc", "question": "Will Bitcoin close above $100k?", "description": "", "tokens": ["YES", "NO"]},
            {"condition_id": "hurricane", "question": "Will a storm make landfall in Florida?", "description": "", "tokens": ["YES", "NO"]}
        ]}
    });
    assert_eq!(post_event(bus.clone(), added).await, StatusCode::OK);

    let resolved = json!({
        "event": "market_resolved",
        "data": {"markets": [{"condition_id": "hurricane", "winning_token": "NO"}]}
    });
    assert_eq!(post_event(bus.clone(), resolved).await, StatusCode::OK);

    // Drain the queue before querying
    handler.shutdown().await;
    assert_eq!(store.len("markets").await, 2);
    assert!(store.get("markets", &market_point_id("hurricane")).await.is_none());

    let matcher = MarketMatcher::new(embedder, store, "markets");
    let mut batch = PollBatch::new(Utc::now());
    batch.push("Wire", vec![article("Fed signals patience"), article("Storm season begins")]);

    let matches = matcher.match_batch(&batch, 1).await;
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].markets[0].market.condition_id, "rates");
    // The resolved storm market is gone; the best remaining hit is unrelated
    assert_ne!(matches[1].markets[0].market.condition_id, "hurricane");
}
