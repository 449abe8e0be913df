//! Web search provider used when the knowledge base has no close match.
//!
//! [`TavilyClient`] calls the Tavily search API. When no `TAVILY_API_KEY` is
//! configured no client is built at all and the router answers with a
//! "disabled" message instead.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::WebSearchConfig;
use crate::error::{Error, Result};
use crate::models::WebSnippet;

const SERVICE: &str = "web_search";

/// Answers free-text queries with web snippets.
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Return at most `max_results` snippets for `query`.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebSnippet>>;
}

pub struct TavilyClient {
    client: reqwest::Client,
    api_key: String,
    url: String,
}

impl TavilyClient {
    pub fn new(config: &WebSearchConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build web search client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            url: config.url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl WebSearchProvider for TavilyClient {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebSnippet>> {
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
        });

        let response = self
            .client
            .post(format!("{}/search", self.url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::upstream(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                SERVICE,
                format!("Tavily API error {}: {}", status, body_text),
            ));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(SERVICE, e))?;
        Ok(into_snippets(parsed, max_results))
    }
}

fn into_snippets(response: TavilyResponse, max_results: usize) -> Vec<WebSnippet> {
    response
        .results
        .into_iter()
        .take(max_results)
        .map(|r| WebSnippet {
            title: r.title,
            url: r.url,
            content: r.content.unwrap_or_default(),
        })
        .collect()
}
