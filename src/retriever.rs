//! Knowledge base lookup with a similarity threshold.
//!
//! [`Retriever::lookup`] embeds the question, asks the store for the `top_k`
//! nearest neighbours and consults only the best one. A hit requires a
//! score at or above the threshold; a near-miss still reports the observed
//! score so callers can log it. Embedding and store failures propagate.

use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::Result;
use crate::models::Lookup;
use crate::store::KnowledgeStore;

pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn KnowledgeStore>,
    threshold: f32,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn KnowledgeStore>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            threshold: config.threshold,
            top_k: config.top_k.max(1),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Look up `question` using the configured threshold.
    pub async fn lookup(&self, question: &str) -> Result<Lookup> {
        self.lookup_with_threshold(question, self.threshold).await
    }

    pub async fn lookup_with_threshold(&self, question: &str, threshold: f32) -> Result<Lookup> {
        let vector = embed_query(self.embedder.as_ref(), question).await?;
        let mut candidates = self.store.query(&vector, self.top_k).await?;
        // Best first, absent scores last.
        candidates.sort_by(|a, b| {
            let a = a.score.unwrap_or(f32::NEG_INFINITY);
            let b = b.score.unwrap_or(f32::NEG_INFINITY);
            b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
        });

        let Some(best) = candidates.first() else {
            tracing::debug!("knowledge base returned no neighbours");
            return Ok(Lookup::default());
        };

        let score = best.score.filter(|s| !s.is_nan());
        let entry = match score {
            Some(s) if s >= threshold => Some(best.entry.clone()),
            _ => {
                tracing::debug!(?score, threshold, "knowledge base near-miss");
                None
            }
        };

        Ok(Lookup {
            entry,
            score,
            candidates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{KbEntry, ScoredEntry};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;

    /// Returns the same vector for every input.
    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        fn model_name(&self) -> &str {
            "fixed"
        }
        fn dims(&self) -> usize {
            self.0.len()
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| self.0.clone()).collect())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl KnowledgeStore for FailingStore {
        async fn query(&self, _v: &[f32], _l: usize) -> Result<Vec<ScoredEntry>> {
            Err(Error::upstream("knowledge_store", "connection refused"))
        }
        async fn upsert(&self, _p: &[(KbEntry, Vec<f32>)]) -> Result<()> {
            Ok(())
        }
        async fn recreate(&self, _d: usize) -> Result<()> {
            Ok(())
        }
        async fn count(&self) -> Result<u64> {
            Ok(0)
        }
    }

    /// Store that reports a fixed list of results, scores included.
    struct ScriptedStore(Vec<ScoredEntry>);

    #[async_trait]
    impl KnowledgeStore for ScriptedStore {
        async fn query(&self, _v: &[f32], limit: usize) -> Result<Vec<ScoredEntry>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
        async fn upsert(&self, _p: &[(KbEntry, Vec<f32>)]) -> Result<()> {
            Ok(())
        }
        async fn recreate(&self, _d: usize) -> Result<()> {
            Ok(())
        }
        async fn count(&self) -> Result<u64> {
            Ok(self.0.len() as u64)
        }
    }

    fn kb_entry(id: u64, question: &str) -> KbEntry {
        KbEntry {
            id,
            question: question.to_string(),
            solution: "Step 1: Add 2 and 2 → 4. Final Answer: 4.".to_string(),
        }
    }

    fn retriever(store: Arc<dyn KnowledgeStore>) -> Retriever {
        Retriever::new(
            Arc::new(FixedEmbedder(vec![1.0, 0.0])),
            store,
            &RetrievalConfig::default(),
        )
    }

    /// A unit vector whose cosine similarity with `[1, 0]` is `sim`.
    fn at_similarity(sim: f32) -> Vec<f32> {
        vec![sim, (1.0 - sim * sim).sqrt()]
    }

    #[tokio::test]
    async fn test_single_close_entry_is_hit() {
        let store = InMemoryStore::with_points(vec![(
            kb_entry(1, "What is 2 + 2?"),
            at_similarity(0.95),
        )]);
        let lookup = retriever(Arc::new(store)).lookup("What is 2 + 2?").await.unwrap();

        assert!(lookup.is_hit());
        assert_eq!(lookup.entry.unwrap().question, "What is 2 + 2?");
        assert!((lookup.score.unwrap() - 0.95).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_empty_store_reports_nothing() {
        let lookup = retriever(Arc::new(InMemoryStore::new()))
            .lookup("What is 2 + 2?")
            .await
            .unwrap();
        assert!(lookup.entry.is_none());
        assert!(lookup.score.is_none());
    }

    #[tokio::test]
    async fn test_near_miss_keeps_score() {
        let store = InMemoryStore::with_points(vec![(kb_entry(1, "q"), at_similarity(0.6))]);
        let lookup = retriever(Arc::new(store)).lookup("q").await.unwrap();
        assert!(!lookup.is_hit());
        assert!((lookup.score.unwrap() - 0.6).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_threshold_override() {
        let store = Arc::new(InMemoryStore::with_points(vec![(
            kb_entry(1, "q"),
            at_similarity(0.6),
        )]));
        let r = retriever(store);
        assert!(r.lookup_with_threshold("q", 0.5).await.unwrap().is_hit());
        assert!(!r.lookup_with_threshold("q", 0.7).await.unwrap().is_hit());
    }

    #[tokio::test]
    async fn test_score_equal_to_threshold_is_hit() {
        let store = ScriptedStore(vec![ScoredEntry {
            entry: kb_entry(1, "q"),
            score: Some(0.75),
            rank: 0,
        }]);
        assert!(retriever(Arc::new(store)).lookup("q").await.unwrap().is_hit());
    }

    #[tokio::test]
    async fn test_absent_score_is_miss() {
        let store = ScriptedStore(vec![ScoredEntry {
            entry: kb_entry(1, "q"),
            score: None,
            rank: 0,
        }]);
        let lookup = retriever(Arc::new(store)).lookup("q").await.unwrap();
        assert!(!lookup.is_hit());
        assert!(lookup.score.is_none());
        assert_eq!(lookup.candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_only_top_three_consulted_best_wins() {
        let store = ScriptedStore(vec![
            ScoredEntry {
                entry: kb_entry(1, "a"),
                score: Some(0.5),
                rank: 0,
            },
            ScoredEntry {
                entry: kb_entry(2, "b"),
                score: Some(0.8),
                rank: 1,
            },
            ScoredEntry {
                entry: kb_entry(3, "c"),
                score: Some(0.7),
                rank: 2,
            },
            ScoredEntry {
                entry: kb_entry(4, "d"),
                score: Some(0.99),
                rank: 3,
            },
        ]);
        let lookup = retriever(Arc::new(store)).lookup("q").await.unwrap();
        assert_eq!(lookup.candidates.len(), 3);
        assert_eq!(lookup.entry.unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_hit_never_below_threshold() {
        for sim in [0.1f32, 0.5, 0.74, 0.76, 0.9, 1.0] {
            let store = InMemoryStore::with_points(vec![(kb_entry(1, "q"), at_similarity(sim))]);
            let lookup = retriever(Arc::new(store)).lookup("q").await.unwrap();
            if lookup.is_hit() {
                assert!(lookup.score.unwrap() >= 0.75);
            }
        }
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let err = retriever(Arc::new(FailingStore)).lookup("q").await.unwrap_err();
        assert_eq!(err.kind(), "upstream_failure");
    }
}
