//! Knowledge base / web routing.
//!
//! [`FallbackRouter::ask`] is the full answering pipeline:
//!
//! ```text
//! question ─▶ check_input ─▶ Retriever::lookup ─┬─ hit ──▶ KB envelope
//!                 │                              └─ miss ─▶ web search ─▶ Web envelope
//!                 └─ reject ─▶ Error::GuardrailRejection
//! ```
//!
//! Both envelope kinds pass through [`check_output`] before they leave the
//! router. Only the question's answer text is sanitized; the input itself is
//! never rewritten.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::guardrail::{check_input, check_output, REJECTION_MESSAGE};
use crate::models::{AnswerEnvelope, WebSnippet};
use crate::retriever::Retriever;
use crate::websearch::WebSearchProvider;

pub const WEB_DISABLED_MESSAGE: &str = "Web search disabled (missing TAVILY_API_KEY).";
pub const WEB_NO_RESULTS_MESSAGE: &str = "No results found on the web.";
pub const WEB_RESULTS_HEADER: &str = "Web search results:";

pub struct FallbackRouter {
    retriever: Retriever,
    web: Option<Arc<dyn WebSearchProvider>>,
    max_results: usize,
}

impl FallbackRouter {
    /// `web` is `None` when no search credential is configured.
    pub fn new(
        retriever: Retriever,
        web: Option<Arc<dyn WebSearchProvider>>,
        max_results: usize,
    ) -> Self {
        Self {
            retriever,
            web,
            max_results,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn web_enabled(&self) -> bool {
        self.web.is_some()
    }

    /// Gate on the input guardrail, then [`route`](FallbackRouter::route).
    pub async fn ask(&self, question: &str) -> Result<AnswerEnvelope> {
        if !check_input(question) {
            tracing::info!("question rejected by input guardrail");
            return Err(Error::GuardrailRejection(REJECTION_MESSAGE.to_string()));
        }
        self.route(question).await
    }

    /// Answer from the knowledge base when it has a close match, else the web.
    pub async fn route(&self, question: &str) -> Result<AnswerEnvelope> {
        let lookup = self.retriever.lookup(question).await?;

        if let (Some(entry), Some(score)) = (lookup.entry, lookup.score) {
            tracing::info!(id = entry.id, score, "answered from knowledge base");
            return Ok(AnswerEnvelope::Kb {
                score,
                question: entry.question,
                solution: check_output(&entry.solution),
            });
        }

        tracing::info!(best_score = ?lookup.score, "knowledge base miss, falling back to web");
        let answer = self.search_web(question).await?;
        Ok(AnswerEnvelope::Web {
            answer: check_output(&answer),
        })
    }

    async fn search_web(&self, question: &str) -> Result<String> {
        let Some(web) = &self.web else {
            tracing::warn!("web search requested but no credential is configured");
            return Ok(WEB_DISABLED_MESSAGE.to_string());
        };

        let snippets = web.search(question, self.max_results).await?;
        Ok(format_snippets(&snippets))
    }
}

/// Join non-empty snippets under [`WEB_RESULTS_HEADER`].
pub fn format_snippets(snippets: &[WebSnippet]) -> String {
    let lines: Vec<&str> = snippets
        .iter()
        .map(|s| s.content.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if lines.is_empty() {
        return WEB_NO_RESULTS_MESSAGE.to_string();
    }
    format!("{}\n{}", WEB_RESULTS_HEADER, lines.join("\n"))
}
