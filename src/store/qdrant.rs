//! [`KnowledgeStore`] backed by the Qdrant REST API.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | query | `POST /collections/{c}/points/query` |
//! | upsert | `PUT /collections/{c}/points?wait=true` |
//! | recreate | `DELETE /collections/{c}` then `PUT /collections/{c}` |
//! | count | `POST /collections/{c}/points/count` |
//!
//! Each point's payload holds the entry's `question` and `solution`; the
//! point id is the entry id.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::KnowledgeStoreConfig;
use crate::error::{Error, Result};
use crate::models::{KbEntry, ScoredEntry};

use super::KnowledgeStore;

const SERVICE: &str = "knowledge_store";

pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
}

impl QdrantStore {
    pub fn new(config: &KnowledgeStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build qdrant client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            collection: config.collection.clone(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await.map_err(|e| Error::upstream(SERVICE, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                SERVICE,
                format!("qdrant returned {}: {}", status, body),
            ));
        }
        response.json().await.map_err(|e| Error::upstream(SERVICE, e))
    }
}

#[async_trait]
impl KnowledgeStore for QdrantStore {
    async fn query(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredEntry>> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });
        let json = self
            .send(
                self.client
                    .post(format!("{}/points/query", self.collection_url()))
                    .json(&body),
            )
            .await?;
        parse_query_response(&json)
    }

    async fn upsert(&self, points: &[(KbEntry, Vec<f32>)]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let points: Vec<Value> = points
            .iter()
            .map(|(entry, vector)| {
                json!({
                    "id": entry.id,
                    "vector": vector,
                    "payload": {
                        "id": entry.id,
                        "question": entry.question,
                        "solution": entry.solution,
                    },
                })
            })
            .collect();

        self.send(
            self.client
                .put(format!("{}/points?wait=true", self.collection_url()))
                .json(&json!({ "points": points })),
        )
        .await?;
        Ok(())
    }

    async fn recreate(&self, dims: usize) -> Result<()> {
        let response = self
            .client
            .delete(self.collection_url())
            .send()
            .await
            .map_err(|e| Error::upstream(SERVICE, e))?;
        // A missing collection is fine on first setup.
        if !response.status().is_success() && response.status().as_u16() != 404 {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                SERVICE,
                format!("failed to delete collection {}: {}", status, body),
            ));
        }

        self.send(self.client.put(self.collection_url()).json(&json!({
            "vectors": { "size": dims, "distance": "Cosine" }
        })))
        .await?;
        tracing::info!(collection = %self.collection, dims, "collection recreated");
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let json = self
            .send(
                self.client
                    .post(format!("{}/points/count", self.collection_url()))
                    .json(&json!({ "exact": true })),
            )
            .await?;
        json.pointer("/result/count")
            .and_then(|c| c.as_u64())
            .ok_or_else(|| Error::upstream(SERVICE, "invalid count response"))
    }
}

/// Parse a `points/query` response into ranked entries.
fn parse_query_response(json: &Value) -> Result<Vec<ScoredEntry>> {
    let points = json
        .pointer("/result/points")
        .and_then(|p| p.as_array())
        .ok_or_else(|| Error::upstream(SERVICE, "invalid query response: missing result.points"))?;

    points
        .iter()
        .enumerate()
        .map(|(rank, point)| -> Result<ScoredEntry> {
            let id = point
                .get("id")
                .and_then(|id| id.as_u64())
                .ok_or_else(|| Error::upstream(SERVICE, "point id is not an unsigned integer"))?;
            let payload_str = |field: &str| {
                point
                    .pointer(&format!("/payload/{}", field))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        Error::upstream(SERVICE, format!("point {} payload lacks '{}'", id, field))
                    })
            };
            Ok(ScoredEntry {
                entry: KbEntry {
                    id,
                    question: payload_str("question")?,
                    solution: payload_str("solution")?,
                },
                score: point.get("score").and_then(|s| s.as_f64()).map(|s| s as f32),
                rank,
            })
        })
        .collect()
}
