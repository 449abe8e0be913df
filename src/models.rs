//! Core data models used throughout the answering pipeline.
//!
//! These types describe the knowledge base records, similarity results,
//! caller-facing answers and feedback entries that flow between the
//! retriever, router and feedback recorder.

use serde::{Deserialize, Serialize};

/// A solved problem stored in the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KbEntry {
    pub id: u64,
    pub question: String,
    pub solution: String,
}

/// One nearest-neighbour result from the knowledge store.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub entry: KbEntry,
    /// Similarity reported by the store; `None` when the store omits it.
    pub score: Option<f32>,
    /// Zero-based position in the store's ranking.
    pub rank: usize,
}

/// Outcome of a knowledge base lookup.
///
/// `entry` is set only for a hit. `score` carries the best observed
/// similarity for hits and near-misses alike.
#[derive(Debug, Clone, Default)]
pub struct Lookup {
    pub entry: Option<KbEntry>,
    pub score: Option<f32>,
    /// Every neighbour the store returned, best first.
    pub candidates: Vec<ScoredEntry>,
}

impl Lookup {
    pub fn is_hit(&self) -> bool {
        self.entry.is_some()
    }
}

/// The response returned to a caller of `/ask`.
///
/// Serialized with a `source` tag so a KB answer always carries a score and
/// the matched stored question, while a web answer carries neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source")]
pub enum AnswerEnvelope {
    #[serde(rename = "KB")]
    Kb {
        score: f32,
        question: String,
        solution: String,
    },
    #[serde(rename = "Web")]
    Web { answer: String },
}

impl AnswerEnvelope {
    pub fn source(&self) -> &'static str {
        match self {
            AnswerEnvelope::Kb { .. } => "KB",
            AnswerEnvelope::Web { .. } => "Web",
        }
    }

    /// The answer text shown to the caller.
    pub fn text(&self) -> &str {
        match self {
            AnswerEnvelope::Kb { solution, .. } => solution,
            AnswerEnvelope::Web { answer } => answer,
        }
    }
}

/// A single snippet returned by the web search provider.
#[derive(Debug, Clone, PartialEq)]
pub struct WebSnippet {
    pub title: Option<String>,
    pub url: Option<String>,
    pub content: String,
}

/// A user judgment about a returned answer, as persisted in the feedback log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    /// ISO-8601 UTC timestamp.
    pub timestamp: String,
    pub question: String,
    pub answer: String,
    pub correct: bool,
}
