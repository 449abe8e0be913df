//! End-to-end tests for the HTTP API and the ingestion pipeline.
//!
//! The embedding and web search clients are replaced by in-process fakes and
//! the knowledge store by [`InMemoryStore`], so these tests need no network
//! access or credentials. Each test binds the real axum router to an
//! ephemeral port and talks to it with `reqwest`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

use mathrag::app::App;
use mathrag::config::Config;
use mathrag::embedding::EmbeddingProvider;
use mathrag::guardrail::{BLOCK_NOTICE, REJECTION_MESSAGE};
use mathrag::ingest::{run_ingest, IngestOptions};
use mathrag::models::{FeedbackEntry, KbEntry, WebSnippet};
use mathrag::router::{WEB_DISABLED_MESSAGE, WEB_RESULTS_HEADER};
use mathrag::server::build_router;
use mathrag::store::{InMemoryStore, KnowledgeStore};
use mathrag::websearch::WebSearchProvider;
use mathrag::{Error, Result};

// ─── Fakes ──────────────────────────────────────────────────────────

/// Maps questions mentioning "2 + 2" onto one axis and everything else onto
/// the orthogonal axis, so similarity is either 1.0 or 0.0.
struct AxisEmbedder;

#[async_trait]
impl EmbeddingProvider for AxisEmbedder {
    fn model_name(&self) -> &str {
        "axis"
    }
    fn dims(&self) -> usize {
        2
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                if t.contains("2 + 2") {
                    vec![1.0, 0.0]
                } else {
                    vec![0.0, 1.0]
                }
            })
            .collect())
    }
}

struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }
    fn dims(&self) -> usize {
        2
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::upstream("embedding", "connection refused"))
    }
}

struct CannedWeb {
    snippets: Vec<WebSnippet>,
}

#[async_trait]
impl WebSearchProvider for CannedWeb {
    fn name(&self) -> &str {
        "canned"
    }
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<WebSnippet>> {
        Ok(self.snippets.iter().take(max_results).cloned().collect())
    }
}

struct FailingWeb;

#[async_trait]
impl WebSearchProvider for FailingWeb {
    fn name(&self) -> &str {
        "failing"
    }
    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<WebSnippet>> {
        Err(Error::upstream("web_search", "Tavily API error 500"))
    }
}

fn snippet(content: &str) -> WebSnippet {
    WebSnippet {
        title: None,
        url: None,
        content: content.to_string(),
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn test_config(tmp: &TempDir) -> Config {
    let config_content = format!(
        r#"
[retrieval]
threshold = 0.75
top_k = 3

[feedback]
path = "{}"
"#,
        tmp.path().join("data").join("feedback.json").display()
    );
    toml::from_str(&config_content).unwrap()
}

fn seeded_store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::with_points(vec![(
        KbEntry {
            id: 1,
            question: "What is 2 + 2?".to_string(),
            solution: "Step 1: Add 2 and 2 → 4. Final Answer: 4.".to_string(),
        },
        vec![1.0, 0.0],
    )]))
}

/// Serve `app` on an ephemeral port and return its base URL.
async fn spawn_server(app: &App) -> String {
    let router = build_router(app);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn ask(base: &str, question: &str) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}/ask", base))
        .json(&json!({ "question": question }))
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_healthz() {
    let tmp = TempDir::new().unwrap();
    let app = App::from_parts(
        &test_config(&tmp),
        Arc::new(AxisEmbedder),
        seeded_store(),
        None,
    );
    let base = spawn_server(&app).await;

    let resp = reqwest::get(format!("{}/healthz", base)).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ask_answers_from_knowledge_base() {
    let tmp = TempDir::new().unwrap();
    let app = App::from_parts(
        &test_config(&tmp),
        Arc::new(AxisEmbedder),
        seeded_store(),
        None,
    );
    let base = spawn_server(&app).await;

    let (status, body) = ask(&base, "What is 2 + 2?").await;
    assert_eq!(status, 200);
    assert_eq!(body["source"], "KB");
    assert_eq!(body["question"], "What is 2 + 2?");
    assert!(body["solution"].as_str().unwrap().contains("Final Answer: 4"));
    assert!((body["score"].as_f64().unwrap() - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn test_ask_miss_without_web_search() {
    let tmp = TempDir::new().unwrap();
    let app = App::from_parts(
        &test_config(&tmp),
        Arc::new(AxisEmbedder),
        seeded_store(),
        None,
    );
    let base = spawn_server(&app).await;

    let (status, body) = ask(&base, "kill the dragon math problem 3+3").await;
    assert_eq!(status, 200);
    assert_eq!(body["source"], "Web");
    assert_eq!(body["answer"], WEB_DISABLED_MESSAGE);
    assert!(body.get("score").is_none());
}

#[tokio::test]
async fn test_ask_miss_uses_web_results() {
    let tmp = TempDir::new().unwrap();
    let web = CannedWeb {
        snippets: vec![
            snippet("The derivative of x^2 is 2x."),
            snippet("Power rule: d/dx x^n = n x^(n-1)."),
        ],
    };
    let app = App::from_parts(
        &test_config(&tmp),
        Arc::new(AxisEmbedder),
        seeded_store(),
        Some(Arc::new(web)),
    );
    let base = spawn_server(&app).await;

    let (status, body) = ask(&base, "Find the derivative of x^2").await;
    assert_eq!(status, 200);
    assert_eq!(body["source"], "Web");
    let answer = body["answer"].as_str().unwrap();
    assert!(answer.starts_with(WEB_RESULTS_HEADER));
    assert!(answer.contains("2x"));
    assert!(answer.contains("Power rule"));
}

#[tokio::test]
async fn test_ask_blocks_unsafe_web_answer() {
    let tmp = TempDir::new().unwrap();
    let web = CannedWeb {
        snippets: vec![snippet("How to attack the problem: factor first.")],
    };
    let app = App::from_parts(
        &test_config(&tmp),
        Arc::new(AxisEmbedder),
        seeded_store(),
        Some(Arc::new(web)),
    );
    let base = spawn_server(&app).await;

    let (_, body) = ask(&base, "Factor x^2 - 1").await;
    assert_eq!(body["source"], "Web");
    assert_eq!(body["answer"], BLOCK_NOTICE);
}

#[tokio::test]
async fn test_ask_rejects_non_math_question() {
    let tmp = TempDir::new().unwrap();
    let app = App::from_parts(
        &test_config(&tmp),
        Arc::new(AxisEmbedder),
        seeded_store(),
        None,
    );
    let base = spawn_server(&app).await;

    let (status, body) = ask(&base, "Tell me a joke").await;
    assert_eq!(status, 200);
    assert_eq!(body["error"], REJECTION_MESSAGE);
    assert!(body.get("source").is_none());
}

#[tokio::test]
async fn test_ask_upstream_failure_is_server_error() {
    let tmp = TempDir::new().unwrap();
    let app = App::from_parts(
        &test_config(&tmp),
        Arc::new(FailingEmbedder),
        seeded_store(),
        None,
    );
    let base = spawn_server(&app).await;

    let (status, body) = ask(&base, "What is 2 + 2?").await;
    assert_eq!(status, 500);
    assert_eq!(body["kind"], "upstream_failure");
}

#[tokio::test]
async fn test_ask_web_failure_is_server_error() {
    let tmp = TempDir::new().unwrap();
    let app = App::from_parts(
        &test_config(&tmp),
        Arc::new(AxisEmbedder),
        seeded_store(),
        Some(Arc::new(FailingWeb)),
    );
    let base = spawn_server(&app).await;

    let (status, body) = ask(&base, "Find the derivative of x^2").await;
    assert_eq!(status, 500);
    assert_eq!(body["kind"], "upstream_failure");
    assert!(body["error"].as_str().unwrap().contains("web_search"));
}

#[tokio::test]
async fn test_ask_malformed_body_is_json_error() {
    let tmp = TempDir::new().unwrap();
    let app = App::from_parts(
        &test_config(&tmp),
        Arc::new(AxisEmbedder),
        seeded_store(),
        None,
    );
    let base = spawn_server(&app).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/ask", base))
        .json(&json!({ "text": "What is 2 + 2?" }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "bad_request");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_feedback_on_corrupt_log_is_server_error() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    std::fs::create_dir_all(cfg.feedback.path.parent().unwrap()).unwrap();
    std::fs::write(&cfg.feedback.path, "{ not a json array").unwrap();

    let app = App::from_parts(&cfg, Arc::new(AxisEmbedder), seeded_store(), None);
    let base = spawn_server(&app).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/feedback", base))
        .json(&json!({ "question": "What is 2 + 2?", "answer": "4", "correct": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "persistence_failure");

    let content = std::fs::read_to_string(&cfg.feedback.path).unwrap();
    assert_eq!(content, "{ not a json array");
}

#[tokio::test]
async fn test_concurrent_feedback_keeps_every_entry() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let app = App::from_parts(&cfg, Arc::new(AxisEmbedder), seeded_store(), None);
    let base = spawn_server(&app).await;
    let client = reqwest::Client::new();

    let mut handles = Vec::new();
    for i in 0..20 {
        let client = client.clone();
        let url = format!("{}/feedback", base);
        handles.push(tokio::spawn(async move {
            let resp = client
                .post(url)
                .json(&json!({
                    "question": format!("What is {} + {}?", i, i),
                    "answer": format!("{}", i * 2),
                    "correct": i % 2 == 0,
                }))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status().as_u16(), 200);
            let body: Value = resp.json().await.unwrap();
            assert_eq!(body["status"], "ok");
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let content = std::fs::read_to_string(&cfg.feedback.path).unwrap();
    let entries: Vec<FeedbackEntry> = serde_json::from_str(&content).unwrap();
    assert_eq!(entries.len(), 20);
    assert_eq!(entries.iter().filter(|e| e.correct).count(), 10);

    let timestamps: Vec<&String> = entries.iter().map(|e| &e.timestamp).collect();
    let mut sorted = timestamps.clone();
    sorted.sort();
    assert_eq!(timestamps, sorted);
}

#[tokio::test]
async fn test_ingest_then_ask() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("kb.jsonl");
    std::fs::write(
        &data,
        r#"{"id": 7, "question": "What is 2 + 2?", "solution": "Final Answer: 4."}
{"id": 8, "question": "Solve x + 1 = 3", "solution": "Final Answer: 2."}
"#,
    )
    .unwrap();

    let store = Arc::new(InMemoryStore::new());
    let app = App::from_parts(&test_config(&tmp), Arc::new(AxisEmbedder), store.clone(), None);

    let options = IngestOptions {
        recreate: true,
        batch_size: Some(1),
        dry_run: false,
    };
    let ingested = run_ingest(&app, &data, &options).await.unwrap();
    assert_eq!(ingested, 2);
    assert_eq!(store.count().await.unwrap(), 2);

    let envelope = app.router.ask("What is 2 + 2?").await.unwrap();
    assert_eq!(envelope.source(), "KB");
    assert_eq!(envelope.text(), "Final Answer: 4.");
}

#[tokio::test]
async fn test_ingest_dry_run_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("kb.json");
    std::fs::write(
        &data,
        r#"[{"question": "What is 2 + 2?", "answer": "4"}]"#,
    )
    .unwrap();

    let store = Arc::new(InMemoryStore::new());
    let app = App::from_parts(&test_config(&tmp), Arc::new(AxisEmbedder), store.clone(), None);

    let options = IngestOptions {
        dry_run: true,
        ..Default::default()
    };
    assert_eq!(run_ingest(&app, &data, &options).await.unwrap(), 0);
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_ingest_rejects_colliding_ids() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("kb.json");
    std::fs::write(
        &data,
        r#"[
            {"id": 1, "question": "What is 2 + 2?", "solution": "4"},
            {"question": "What is 3 + 3?", "solution": "6"}
        ]"#,
    )
    .unwrap();

    let store = Arc::new(InMemoryStore::new());
    let app = App::from_parts(&test_config(&tmp), Arc::new(AxisEmbedder), store.clone(), None);

    let err = run_ingest(&app, &data, &IngestOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("share id 1"));
    assert_eq!(store.count().await.unwrap(), 0);
}
