//! HTTP surface for the interview coach.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /cv` – Parse a CV PDF at `path`, generate technical and behavioral questions, and
//!   answer every one of them against the knowledge base.
//! - `POST /ask` – Answer a free-text `question` using the most recently parsed CV.
//! - `POST /video` – Analyze an interview recording at `path` and return behavior and answer
//!   feedback.
//! - `GET /metrics` – Activity counters since startup.
//! - `GET /commands` – Machine-readable command catalog for discovery.
//! - `GET /health` – Liveness check.
//!
//! Pipeline routes always answer `200`; the body's `status` field is `ok` or `error`, and on
//! error the first text field carries the user-facing message.

use crate::coach::{AskOutcome, CoachApi, QaOutcome, VideoOutcome};
use crate::metrics::MetricsSnapshot;
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

/// Build the HTTP router over a coach implementation.
pub fn create_router<S>(coach: Arc<S>) -> Router
where
    S: CoachApi + 'static,
{
    Router::new()
        .route("/cv", post(generate_q_and_a::<S>))
        .route("/ask", post(ask_question::<S>))
        .route("/video", post(analyze_video::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .route("/health", get(health))
        .with_state(coach)
}

/// Request body for `POST /cv` and `POST /video`.
#[derive(Deserialize)]
struct FileRequest {
    /// Local path of the uploaded file; omitted when nothing was uploaded.
    #[serde(default)]
    path: Option<PathBuf>,
}

/// Request body for `POST /ask`.
#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

async fn generate_q_and_a<S>(
    State(coach): State<Arc<S>>,
    Json(request): Json<FileRequest>,
) -> Json<QaOutcome>
where
    S: CoachApi,
{
    let outcome = coach.generate_q_and_a(request.path).await;
    tracing::info!(status = ?outcome.status, "CV request completed");
    Json(outcome)
}

async fn ask_question<S>(
    State(coach): State<Arc<S>>,
    Json(request): Json<AskRequest>,
) -> Json<AskOutcome>
where
    S: CoachApi,
{
    let outcome = coach.answer_custom_question(&request.question).await;
    tracing::info!(status = ?outcome.status, "Ask request completed");
    Json(outcome)
}

async fn analyze_video<S>(
    State(coach): State<Arc<S>>,
    Json(request): Json<FileRequest>,
) -> Json<VideoOutcome>
where
    S: CoachApi,
{
    let outcome = coach.analyze_video(request.path).await;
    tracing::info!(status = ?outcome.status, "Video request completed");
    Json(outcome)
}

/// Return the activity counters.
async fn get_metrics<S>(State(coach): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: CoachApi,
{
    Json(coach.metrics_snapshot())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "generate_q_and_a",
                method: "POST",
                path: "/cv",
                description: "Parse a CV PDF, generate technical and behavioral questions, and answer each one. Returns { status, cv_text, technical_questions, behavioral_questions, technical_answers, behavioral_answers }.",
                request_example: Some(json!({ "path": "/uploads/cv.pdf" })),
            },
            CommandDescriptor {
                name: "ask",
                method: "POST",
                path: "/ask",
                description: "Answer a custom question using the most recently parsed CV as background.",
                request_example: Some(json!({ "question": "How should I describe my leadership experience?" })),
            },
            CommandDescriptor {
                name: "analyze_video",
                method: "POST",
                path: "/video",
                description: "Transcribe an interview recording, score posture and blinking, and return behavior and answer feedback.",
                request_example: Some(json!({ "path": "/uploads/interview.mp4" })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return counters for parsed CVs, answered questions, analyzed videos and failures.",
                request_example: None,
            },
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                description: "Liveness check.",
                request_example: None,
            },
        ],
    })
}
