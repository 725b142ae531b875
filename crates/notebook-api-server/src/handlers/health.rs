use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    status: &'static str,
    version: &'static str,
    conversations: usize,
    documents: usize,
    notebooks: usize,
    indexed_chunks: usize,
}

#[derive(Serialize)]
pub struct RootResponse {
    message: &'static str,
    version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "notebook-backend",
    })
}

/// Ready once the conversation store answers.
pub async fn readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let conversations = state.conversation_manager.conversation_count().await;
    let documents = state.document_service.list().await.map(|d| d.len());

    let (status, code) = match (&conversations, &documents) {
        (Ok(_), Ok(_)) => ("ready", StatusCode::OK),
        _ => ("degraded", StatusCode::SERVICE_UNAVAILABLE),
    };
    if let Err(e) = &conversations {
        tracing::error!("Readiness: conversation store unavailable: {}", e);
    }

    (
        code,
        Json(ReadinessResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            conversations: conversations.unwrap_or(0),
            documents: documents.unwrap_or(0),
            notebooks: state.notebook_service.len(),
            indexed_chunks: state.vector_index.chunk_count(),
        }),
    )
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Notebook LM Clone Backend",
        version: env!("CARGO_PKG_VERSION"),
    })
}
