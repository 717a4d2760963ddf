//! Market question index
//!
//! Markets are embedded by their question text and kept in a vector store
//! so incoming articles can be matched against open markets.

mod matcher;
mod memory;
mod openai;

pub use matcher::{ArticleMatch, MarketMatcher};
pub use memory::InMemoryVectorStore;
pub use openai::OpenAiEmbedder;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::webhook::Market;
use crate::Result;

/// Turns text into a fixed-length vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// A market stored in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub market: Market,
}

impl MarketPoint {
    pub fn new(market: Market, vector: Vec<f32>) -> Self {
        Self {
            id: market_point_id(&market.condition_id),
            vector,
            market,
        }
    }
}

/// Query hit, best match first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: Uuid,
    pub score: f32,
    pub market: Market,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace a point by id
    async fn upsert(&self, collection: &str, point: MarketPoint) -> Result<()>;

    /// Up to `k` points ranked by similarity to `vector`
    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>>;

    /// Remove points; unknown ids are ignored. Returns how many were removed.
    async fn delete(&self, collection: &str, ids: &[Uuid]) -> Result<usize>;
}

/// Deterministic point id for a market condition id (UUIDv5, URL namespace)
pub fn market_point_id(condition_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, condition_id.as_bytes())
}
