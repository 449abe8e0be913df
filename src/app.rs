//! Composition root.
//!
//! [`App`] owns the long-lived clients (embedding, knowledge store, web
//! search) and the components built on top of them. It is created once per
//! process and shared by every request. Tests use [`App::from_parts`] to
//! inject fakes.

use std::sync::Arc;

use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::Result;
use crate::feedback::FeedbackRecorder;
use crate::retriever::Retriever;
use crate::router::FallbackRouter;
use crate::store::{KnowledgeStore, QdrantStore};
use crate::websearch::{TavilyClient, WebSearchProvider};

pub struct App {
    pub config: Arc<Config>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub store: Arc<dyn KnowledgeStore>,
    pub router: Arc<FallbackRouter>,
    pub feedback: Arc<FeedbackRecorder>,
}

impl App {
    /// Build the production clients described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::from(create_provider(
            &config.embedding,
            config.credentials.openai_api_key.as_deref(),
        )?);

        let store: Arc<dyn KnowledgeStore> = Arc::new(QdrantStore::new(&config.knowledge_store)?);

        let web: Option<Arc<dyn WebSearchProvider>> = match &config.credentials.tavily_api_key {
            Some(key) => Some(Arc::new(TavilyClient::new(
                &config.web_search,
                key.clone(),
            )?)),
            None => {
                tracing::warn!("TAVILY_API_KEY not set, web fallback disabled");
                None
            }
        };

        tracing::info!(
            model = embedder.model_name(),
            store = %config.knowledge_store.base_url(),
            collection = %config.knowledge_store.collection,
            web = web.as_ref().map(|w| w.name()).unwrap_or("disabled"),
            "clients initialized"
        );

        Ok(Self::from_parts(config, embedder, store, web))
    }

    /// Assemble the application from already-built clients.
    pub fn from_parts(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn KnowledgeStore>,
        web: Option<Arc<dyn WebSearchProvider>>,
    ) -> Self {
        let retriever = Retriever::new(embedder.clone(), store.clone(), &config.retrieval);
        let router = FallbackRouter::new(retriever, web, config.web_search.max_results);
        let feedback = FeedbackRecorder::new(config.feedback.path.clone());

        Self {
            config: Arc::new(config.clone()),
            embedder,
            store,
            router: Arc::new(router),
            feedback: Arc::new(feedback),
        }
    }
}
