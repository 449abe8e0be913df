//! Error taxonomy for the answering pipeline.
//!
//! The pipeline modules (embedding, store, web search, retriever, router,
//! feedback) return [`Result`]; the CLI-facing `config`, `ingest` and
//! `query` modules use `anyhow`. The variants map one-to-one
//! onto the failure classes the HTTP boundary distinguishes:
//!
//! | Variant | Kind tag | Server fault |
//! |---------|----------|--------------|
//! | [`Error::GuardrailRejection`] | `guardrail_rejection` | no |
//! | [`Error::Upstream`] | `upstream_failure` | yes |
//! | [`Error::Persistence`] | `persistence_failure` | yes |
//! | [`Error::Config`] | `configuration` | yes |
//!
//! A disabled web search is not an error at all; the router answers with a
//! descriptive message instead.

use thiserror::Error;

/// Failures surfaced by the retrieval, routing and feedback paths.
#[derive(Debug, Error)]
pub enum Error {
    /// The question failed the math-topic input check.
    #[error("{0}")]
    GuardrailRejection(String),

    /// An embedding, knowledge store or web search call failed.
    #[error("{service} request failed: {message}")]
    Upstream {
        /// `embedding`, `knowledge_store` or `web_search`.
        service: &'static str,
        message: String,
    },

    /// The feedback log could not be read or written.
    #[error("feedback log error: {0}")]
    Persistence(String),

    /// A client could not be built from the configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn upstream(service: &'static str, err: impl std::fmt::Display) -> Self {
        Error::Upstream {
            service,
            message: err.to_string(),
        }
    }

    pub fn persistence(err: impl std::fmt::Display) -> Self {
        Error::Persistence(err.to_string())
    }

    /// Stable machine-readable tag for the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::GuardrailRejection(_) => "guardrail_rejection",
            Error::Upstream { .. } => "upstream_failure",
            Error::Persistence(_) => "persistence_failure",
            Error::Config(_) => "configuration",
        }
    }

    /// Whether the failure should be reported with a server-fault status.
    pub fn is_server_fault(&self) -> bool {
        !matches!(self, Error::GuardrailRejection(_))
    }
}
