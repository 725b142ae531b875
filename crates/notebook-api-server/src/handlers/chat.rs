use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::chat::*;
use crate::services::conversation::{
    ChatOutcome, ConversationManager, ConversationStatus, RetrievalScope,
};
use crate::services::NotebookService;
use crate::utils::error::ApiError;

/// Explicit documents win; otherwise the notebook's documents; otherwise
/// the whole corpus. An empty list counts as absent.
fn resolve_scope(
    notebooks: &NotebookService,
    documents: Option<Vec<DocumentId>>,
    notebook_id: Option<String>,
) -> Result<RetrievalScope, ApiError> {
    let scope = RetrievalScope::from_ids(documents);
    match notebook_id {
        Some(notebook_id) if scope.is_unconstrained() => notebooks.scope(&notebook_id),
        _ => Ok(scope),
    }
}

fn chat_response(outcome: ChatOutcome) -> ChatResponse {
    ChatResponse {
        grounded: outcome.grounded(),
        notice: outcome.notice(),
        chat_id: outcome.chat_id,
        messages: outcome.messages,
        answer: outcome.answer,
        citations: outcome.citations,
    }
}

pub async fn send_message(
    State(manager): State<Arc<ConversationManager>>,
    State(notebooks): State<Arc<NotebookService>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message must not be empty".to_string()));
    }
    if request.stream {
        warn!("Streaming requested but not supported; answering in one response");
    }

    let chat_id = request
        .chat_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let scope = resolve_scope(&notebooks, request.documents, request.notebook_id)?;

    info!(
        "Chat request: chat={}, message_len={}, scope_size={:?}",
        chat_id,
        message.len(),
        scope.len()
    );

    let outcome = manager.generate_answer(&chat_id, &scope, message).await?;
    Ok(Json(chat_response(outcome)))
}

pub async fn retry_answer(
    State(manager): State<Arc<ConversationManager>>,
    State(notebooks): State<Arc<NotebookService>>,
    Path(chat_id): Path<String>,
    Json(request): Json<RetryRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let scope = resolve_scope(&notebooks, request.documents, request.notebook_id)?;
    let outcome = manager.resume_answer(&chat_id, &scope).await?;
    Ok(Json(chat_response(outcome)))
}

pub async fn list_messages(
    State(manager): State<Arc<ConversationManager>>,
    Path(chat_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    // Derive everything from one snapshot
    let messages = manager.messages(&chat_id).await?;
    let status = if messages.is_empty() {
        ConversationStatus::Empty
    } else {
        ConversationStatus::Active
    };
    let awaiting_answer = messages
        .last()
        .is_some_and(|turn| turn.role == Role::User);

    Ok(Json(HistoryResponse {
        chat_id,
        status,
        awaiting_answer,
        messages,
    }))
}

pub async fn record_turn(
    State(manager): State<Arc<ConversationManager>>,
    Path(chat_id): Path<String>,
    Json(request): Json<RecordTurnRequest>,
) -> Result<(StatusCode, Json<RecordTurnResponse>), ApiError> {
    let turn = manager
        .record_turn(&chat_id, &request.role, request.content, request.source_documents)
        .await?;
    let message_count = manager.messages(&chat_id).await?.len();

    Ok((
        StatusCode::CREATED,
        Json(RecordTurnResponse {
            chat_id,
            turn,
            message_count,
        }),
    ))
}
