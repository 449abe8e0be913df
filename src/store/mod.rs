//! Knowledge store abstraction.
//!
//! The [`KnowledgeStore`] trait is the similarity-search contract the
//! retriever depends on, plus the write operations the ingestion commands
//! need. Two backends are provided:
//!
//! - [`qdrant::QdrantStore`]: the Qdrant REST API.
//! - [`memory::InMemoryStore`]: brute-force cosine similarity, for tests.
//!
//! Implementations must be `Send + Sync` so one instance can be shared by
//! every request.

pub mod memory;
pub mod qdrant;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{KbEntry, ScoredEntry};

pub use memory::InMemoryStore;
pub use qdrant::QdrantStore;

/// Vector index holding solved problems.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`query`](KnowledgeStore::query) | Nearest neighbours by cosine similarity |
/// | [`upsert`](KnowledgeStore::upsert) | Insert or replace entries with their vectors |
/// | [`recreate`](KnowledgeStore::recreate) | Drop and recreate the collection |
/// | [`count`](KnowledgeStore::count) | Number of stored entries |
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Return up to `limit` entries ordered by descending similarity.
    async fn query(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredEntry>>;

    /// Insert or replace entries, keyed by [`KbEntry::id`].
    async fn upsert(&self, points: &[(KbEntry, Vec<f32>)]) -> Result<()>;

    /// Drop every entry and prepare the store for vectors of `dims` length.
    async fn recreate(&self, dims: usize) -> Result<()>;

    async fn count(&self) -> Result<u64>;
}
