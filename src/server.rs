//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a math question from the KB or the web |
//! | `POST` | `/feedback` | Record a correctness judgment |
//! | `GET`  | `/healthz` | Health check |
//!
//! # Error Contract
//!
//! A question rejected by the input guardrail is a normal `200` response:
//!
//! ```json
//! { "error": "❌ Only math-related questions are allowed." }
//! ```
//!
//! Upstream and persistence failures return `500` with the error kind:
//!
//! ```json
//! { "error": "embedding request failed: ...", "kind": "upstream_failure" }
//! ```
//!
//! A missing or malformed JSON body keeps axum's rejection status (`400`,
//! `415` or `422`) with `kind: "bad_request"`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser frontend
//! can call the API from another port.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::App;
use crate::error::Error;
use crate::feedback::{FeedbackRecorder, ACK_MESSAGE};
use crate::models::AnswerEnvelope;
use crate::router::FallbackRouter;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    router: Arc<FallbackRouter>,
    feedback: Arc<FeedbackRecorder>,
}

/// Build the axum router for `app`.
pub fn build_router(app: &App) -> Router {
    let state = AppState {
        router: app.router.clone(),
        feedback: app.feedback.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/feedback", post(handle_feedback))
        .route("/healthz", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(app: &App) -> anyhow::Result<()> {
    let bind_addr = app.config.server.bind.clone();
    let router = build_router(app);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

/// Error response for every endpoint.
enum AppError {
    Pipeline(Error),
    BadRequest { status: StatusCode, message: String },
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError::Pipeline(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = match self {
            AppError::BadRequest { status, message } => {
                let body = ErrorBody {
                    error: message,
                    kind: Some("bad_request"),
                };
                return (status, Json(body)).into_response();
            }
            AppError::Pipeline(err) => err,
        };

        if !err.is_server_fault() {
            let body = ErrorBody {
                error: err.to_string(),
                kind: None,
            };
            return (StatusCode::OK, Json(body)).into_response();
        }

        tracing::error!(kind = err.kind(), error = ?err, "request failed");
        let body = ErrorBody {
            error: err.to_string(),
            kind: Some(err.kind()),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

// ============ GET /healthz ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AnswerEnvelope>, AppError> {
    let Json(req) = payload?;
    let envelope = state.router.ask(&req.question).await?;
    Ok(Json(envelope))
}

// ============ POST /feedback ============

#[derive(Deserialize)]
struct FeedbackRequest {
    question: String,
    answer: String,
    correct: bool,
}

#[derive(Serialize)]
struct FeedbackResponse {
    status: &'static str,
    message: &'static str,
}

async fn handle_feedback(
    State(state): State<AppState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let Json(req) = payload?;
    state
        .feedback
        .record(&req.question, &req.answer, req.correct)
        .await?;
    Ok(Json(FeedbackResponse {
        status: "ok",
        message: ACK_MESSAGE,
    }))
}
