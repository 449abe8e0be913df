//! # mathrag
//!
//! Math question answering with retrieval, web fallback, and guardrails.
//!
//! A question passes an input guardrail, is embedded, and is matched against
//! a curated knowledge base of solved problems. A close enough match is
//! returned with its stored solution; otherwise the question is sent to a
//! web search provider. Every answer passes an output guardrail before it
//! is returned. Users can report whether an answer was correct; those
//! judgments are appended to a JSON log.
//!
//! ## Architecture
//!
//! ```text
//!   question
//!      │
//!      ▼
//! ┌───────────┐   ┌───────────┐   ┌────────────┐
//! │ guardrail │──▶│ retriever │──▶│   Qdrant   │
//! │  (input)  │   │ embed+kNN │   │ math_kb    │
//! └───────────┘   └─────┬─────┘   └────────────┘
//!                       │ miss
//!                       ▼
//!                 ┌───────────┐   ┌────────────┐
//!                 │  router   │──▶│   Tavily   │
//!                 └─────┬─────┘   └────────────┘
//!                       ▼
//!                 ┌───────────┐
//!                 │ guardrail │──▶ AnswerEnvelope
//!                 │ (output)  │
//!                 └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`app`] | Composition root holding the shared clients |
//! | [`config`] | TOML configuration and environment overrides |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`error`] | Pipeline error kinds |
//! | [`feedback`] | Serialized feedback log |
//! | [`guardrail`] | Input and output content checks |
//! | [`ingest`] | Knowledge base seeding |
//! | [`models`] | Core data types |
//! | [`query`] | One-shot CLI queries |
//! | [`retriever`] | Nearest-neighbour lookup and threshold decision |
//! | [`router`] | KB-or-web answer routing |
//! | [`server`] | HTTP server |
//! | [`store`] | Knowledge store backends |
//! | [`websearch`] | Web search provider |

pub mod app;
pub mod config;
pub mod embedding;
pub mod error;
pub mod feedback;
pub mod guardrail;
pub mod ingest;
pub mod models;
pub mod query;
pub mod retriever;
pub mod router;
pub mod server;
pub mod store;
pub mod websearch;

pub use error::{Error, Result};
