use std::sync::Arc;

use super::{Embedder, ScoredPoint, VectorStore};
use crate::feed::Article;
use crate::poller::PollBatch;
use crate::Result;

/// An article together with the markets closest to it
#[derive(Debug, Clone)]
pub struct ArticleMatch {
    pub article: Article,
    pub markets: Vec<ScoredPoint>,
}

/// Looks up the markets most similar to a news article
#[derive(Clone)]
pub struct MarketMatcher {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl MarketMatcher {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, collection: impl Into<String>) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
        }
    }

    /// Top `k` markets for an article; lookup failures yield an empty list
    pub async fn find_similar_markets(&self, article: &Article, k: usize) -> Vec<ScoredPoint> {
        match self.try_find(article, k).await {
            Ok(markets) => markets,
            Err(e) => {
                tracing::error!("Error finding similar markets for '{}': {}", article.title, e);
                Vec::new()
            }
        }
    }

    async fn try_find(&self, article: &Article, k: usize) -> Result<Vec<ScoredPoint>> {
        let vector = self.embedder.embed(&article.matching_text()).await?;
        self.store.query(&self.collection, &vector, k).await
    }

    /// Match every new article of a poll batch, in batch order
    pub async fn match_batch(&self, batch: &PollBatch, k: usize) -> Vec<ArticleMatch> {
        let mut matches = Vec::with_capacity(batch.total_new());
        for (_, articles) in batch.iter() {
            for article in articles {
                let markets = self.find_similar_markets(article, k).await;
                matches.push(ArticleMatch {
                    article: article.clone(),
                    markets,
                });
            }
        }
        matches
    }
}
