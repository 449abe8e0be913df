//! In-memory [`KnowledgeStore`] implementation for testing.
//!
//! Entries live in a `Vec` behind a `tokio::sync::RwLock`. Queries are
//! brute-force cosine similarity over every stored vector.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::embedding::cosine_similarity;
use crate::error::Result;
use crate::models::{KbEntry, ScoredEntry};

use super::KnowledgeStore;

struct StoredPoint {
    entry: KbEntry,
    vector: Vec<f32>,
}

/// In-memory knowledge store.
#[derive(Default)]
pub struct InMemoryStore {
    points: RwLock<Vec<StoredPoint>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `points`.
    pub fn with_points(points: Vec<(KbEntry, Vec<f32>)>) -> Self {
        let stored = points
            .into_iter()
            .map(|(entry, vector)| StoredPoint { entry, vector })
            .collect();
        Self {
            points: RwLock::new(stored),
        }
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn query(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredEntry>> {
        let points = self.points.read().await;
        let mut scored: Vec<(f32, &KbEntry)> = points
            .iter()
            .map(|p| (cosine_similarity(vector, &p.vector), &p.entry))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(rank, (score, entry))| ScoredEntry {
                entry: entry.clone(),
                score: Some(score),
                rank,
            })
            .collect())
    }

    async fn upsert(&self, new_points: &[(KbEntry, Vec<f32>)]) -> Result<()> {
        let mut points = self.points.write().await;
        for (entry, vector) in new_points {
            points.retain(|p| p.entry.id != entry.id);
            points.push(StoredPoint {
                entry: entry.clone(),
                vector: vector.clone(),
            });
        }
        Ok(())
    }

    async fn recreate(&self, _dims: usize) -> Result<()> {
        self.points.write().await.clear();
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.points.read().await.len() as u64)
    }
}
