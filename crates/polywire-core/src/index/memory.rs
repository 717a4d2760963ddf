use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{MarketPoint, ScoredPoint, VectorStore};
use crate::{Error, Result};

/// Process-local vector store ranking by cosine similarity
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, HashMap<Uuid, MarketPoint>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, HashMap::len)
    }

    pub async fn get(&self, collection: &str, id: &Uuid) -> Option<MarketPoint> {
        self.collections
            .read()
            .await
            .get(collection)
            .and_then(|points| points.get(id).cloned())
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, collection: &str, point: MarketPoint) -> Result<()> {
        let mut collections = self.collections.write().await;
        let points = collections.entry(collection.to_string()).or_default();

        if let Some(existing) = points.values().next() {
            if existing.vector.len() != point.vector.len() {
                return Err(Error::VectorStore(format!(
                    "Vector dimension mismatch in '{}': expected {}, got {}",
                    collection,
                    existing.vector.len(),
                    point.vector.len()
                )));
            }
        }

        points.insert(point.id, point);
        Ok(())
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let Some(points) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<ScoredPoint> = Vec::with_capacity(points.len());
        for point in points.values() {
            if point.vector.len() != vector.len() {
                return Err(Error::VectorStore(format!(
                    "Query dimension {} does not match collection '{}' ({})",
                    vector.len(),
                    collection,
                    point.vector.len()
                )));
            }
            scored.push(ScoredPoint {
                id: point.id,
                score: cosine(&point.vector, vector),
                market: point.market.clone(),
            });
        }

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete(&self, collection: &str, ids: &[Uuid]) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let Some(points) = collections.get_mut(collection) else {
            return Ok(0);
        };
        Ok(ids.iter().filter(|id| points.remove(id).is_some()).count())
    }
}
