use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::protocol::{added_markets, payout_logs, resolved_markets, Market};
use crate::index::{market_point_id, Embedder, MarketPoint, VectorStore};
use crate::{Error, Result};

const WORKER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Receives the three market lifecycle events.
///
/// Called synchronously from the request that delivered the event, possibly
/// from several requests at once. Slow work belongs on a queue.
pub trait MarketEventHandler: Send + Sync {
    fn on_market_added(&self, data: &Value) -> Result<()>;
    fn on_market_resolved(&self, data: &Value) -> Result<()>;
    fn on_payout_logs(&self, data: &Value) -> Result<()>;
}

/// Logs every event it receives
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl MarketEventHandler for LoggingHandler {
    fn on_market_added(&self, data: &Value) -> Result<()> {
        let markets = added_markets(data);
        info!("market_added: {} markets", markets.len());
        if let Some(first) = markets.first() {
            info!("market_added first: {} ({})", first.question, first.condition_id);
        }
        Ok(())
    }

    fn on_market_resolved(&self, data: &Value) -> Result<()> {
        let resolved = resolved_markets(data);
        info!("market_resolved: {} markets", resolved.len());
        for market in &resolved {
            info!(
                "  {} -> {}",
                market.condition_id,
                market.winning_token.as_deref().unwrap_or("unknown")
            );
        }
        Ok(())
    }

    fn on_payout_logs(&self, data: &Value) -> Result<()> {
        let payouts = payout_logs(data);
        info!("payout_logs: {} records", payouts.len());
        for payout in &payouts {
            info!(
                "  {} {} {} shares of {} on '{}'",
                payout.user_name,
                if payout.is_winner { "won" } else { "lost" },
                payout.shares_paid,
                payout.token,
                payout.market
            );
        }
        Ok(())
    }
}

enum IndexJob {
    Upsert(Vec<Market>),
    Remove(Vec<Uuid>),
}

/// Keeps the market index in sync with lifecycle events.
///
/// Events only enqueue work; a single worker task embeds and upserts added
/// markets and deletes resolved ones in arrival order.
pub struct MarketIndexHandler {
    queue: Mutex<Option<mpsc::UnboundedSender<IndexJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    max_markets: Option<usize>,
}

impl MarketIndexHandler {
    /// Start the worker. Must be called inside a Tokio runtime.
    pub fn spawn(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        max_markets: Option<usize>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = IndexWorker {
            embedder,
            store,
            collection: collection.into(),
        };
        let handle = tokio::spawn(worker.run(rx));
        info!("Market index worker started");

        Self {
            queue: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(handle)),
            max_markets,
        }
    }

    fn enqueue(&self, job: IndexJob) -> Result<()> {
        let queue = self.queue.lock().unwrap_or_else(|p| p.into_inner());
        match queue.as_ref() {
            Some(tx) => tx
                .send(job)
                .map_err(|_| Error::Other("Market index worker has stopped".to_string())),
            None => Err(Error::Other("Market index handler is shut down".to_string())),
        }
    }

    /// Stop accepting work and wait for queued jobs to finish (bounded)
    pub async fn shutdown(&self) {
        info!("Shutting down market index worker...");
        self.queue.lock().unwrap_or_else(|p| p.into_inner()).take();

        let handle = self.worker.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(WORKER_SHUTDOWN_TIMEOUT, &mut handle)
                .await
                .is_err()
            {
                warn!("Market index worker did not finish in time, aborting");
                handle.abort();
            }
        }
        info!("Market index worker shutdown complete");
    }
}

impl MarketEventHandler for MarketIndexHandler {
    fn on_market_added(&self, data: &Value) -> Result<()> {
        let mut markets = added_markets(data);
        if let Some(max) = self.max_markets {
            markets.truncate(max);
        }
        if markets.is_empty() {
            return Ok(());
        }

        info!("Queueing {} markets for indexing", markets.len());
        self.enqueue(IndexJob::Upsert(markets))
    }

    fn on_market_resolved(&self, data: &Value) -> Result<()> {
        let ids: Vec<Uuid> = resolved_markets(data)
            .iter()
            .map(|m| market_point_id(&m.condition_id))
            .collect();
        if ids.is_empty() {
            return Ok(());
        }
        self.enqueue(IndexJob::Remove(ids))
    }

    fn on_payout_logs(&self, _data: &Value) -> Result<()> {
        Ok(())
    }
}

struct IndexWorker {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl IndexWorker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<IndexJob>) {
        while let Some(job) = rx.recv().await {
            match job {
                IndexJob::Upsert(markets) => self.upsert_markets(markets).await,
                IndexJob::Remove(ids) => self.remove_markets(ids).await,
            }
        }
        info!("Market index worker stopped");
    }

    async fn upsert_markets(&self, markets: Vec<Market>) {
        let total = markets.len();
        info!("Worker processing {} markets", total);

        let mut processed = 0;
        for (i, market) in markets.into_iter().enumerate() {
            let condition_id = market.condition_id.clone();
            match self.upsert_market(market).await {
                Ok(()) => processed += 1,
                Err(e) => error!("Error processing market {}: {}", condition_id, e),
            }
            if (i + 1) % 10 == 0 {
                info!("Processed {}/{} markets", i + 1, total);
            }
        }

        info!("Completed batch: {}/{} markets indexed", processed, total);
    }

    async fn upsert_market(&self, market: Market) -> Result<()> {
        let vector = self.embedder.embed(&market.question).await?;
        if vector.is_empty() {
            return Err(Error::AiProvider("Empty embedding".to_string()));
        }
        self.store
            .upsert(&self.collection, MarketPoint::new(market, vector))
            .await
    }

    async fn remove_markets(&self, ids: Vec<Uuid>) {
        match self.store.delete(&self.collection, &ids).await {
            Ok(removed) => info!("Deleted {} resolved markets from index", removed),
            Err(e) => error!("Error deleting resolved markets: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::index::InMemoryVectorStore;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("fail") {
                return Err(Error::AiProvider("upstream unavailable".into()));
            }
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    fn market(id: &str, question: &str) -> Value {
        json!({"condition_id": id, "question": question, "description": "", "tokens": ["YES", "NO"]})
    }

    #[tokio::test]
    async fn test_added_markets_are_indexed() {
        let store = Arc::new(InMemoryVectorStore::new());
        let handler = MarketIndexHandler::spawn(Arc::new(LengthEmbedder), store.clone(), "markets", None);

        handler
            .on_market_added(&json!({"markets": [market("a", "Will A?"), market("b", "please fail"), market("c", "Will C?")]}))
            .unwrap();
        handler.shutdown().await;

        assert_eq!(store.len("markets").await, 2);
        let point = store.get("markets", &market_point_id("a")).await.unwrap();
        assert_eq!(point.market.question, "Will A?");
        assert!(store.get("markets", &market_point_id("b")).await.is_none());
    }

    #[tokio::test]
    async fn test_max_markets_cap() {
        let store = Arc::new(InMemoryVectorStore::new());
        let handler = MarketIndexHandler::spawn(Arc::new(LengthEmbedder), store.clone(), "markets", Some(1));

        handler
            .on_market_added(&json!({"markets": [market("a", "first"), market("b", "second")]}))
            .unwrap();
        handler.shutdown().await;

        assert_eq!(store.len("markets").await, 1);
        assert!(store.get("markets", &market_point_id("a")).await.is_some());
    }

    #[tokio::test]
    async fn test_resolved_markets_removed_after_add() {
        let store = Arc::new(InMemoryVectorStore::new());
        let handler = MarketIndexHandler::spawn(Arc::new(LengthEmbedder), store.clone(), "markets", None);

        handler
            .on_market_added(&json!({"markets": [market("a", "q1"), market("b", "q2")]}))
            .unwrap();
        handler
            .on_market_resolved(&json!({"markets": [{"condition_id": "a", "winning_token": "YES"}]}))
            .unwrap();
        handler.shutdown().await;

        assert_eq!(store.len("markets").await, 1);
        assert!(store.get("markets", &market_point_id("b")).await.is_some());
    }

    #[tokio::test]
    async fn test_events_after_shutdown_are_errors() {
        let store = Arc::new(InMemoryVectorStore::new());
        let handler = MarketIndexHandler::spawn(Arc::new(LengthEmbedder), store, "markets", None);
        handler.shutdown().await;

        assert!(handler.on_market_added(&json!({"markets": [market("a", "q")]})).is_err());
        // Nothing to enqueue is not an error
        assert!(handler.on_market_added(&json!({})).is_ok());
    }

    #[test]
    fn test_logging_handler_accepts_all_events() {
        let handler = LoggingHandler;
        assert!(handler.on_market_added(&json!({"markets": [market("a", "q")]})).is_ok());
        assert!(handler.on_market_resolved(&json!({})).is_ok());
        assert!(handler
            .on_payout_logs(&json!({"payouts": [{"user_name": "alice", "market": "m", "token": "YES", "shares_paid": 1.5}]}))
            .is_ok());
    }
}
