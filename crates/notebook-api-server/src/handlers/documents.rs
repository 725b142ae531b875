use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::models::document::*;
use crate::services::DocumentService;
use crate::utils::error::ApiError;

pub async fn register_document(
    State(documents): State<Arc<DocumentService>>,
    Json(request): Json<RegisterDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentRecord>), ApiError> {
    let record = documents
        .register(&request.file_name, &request.content)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_documents(
    State(documents): State<Arc<DocumentService>>,
) -> Result<Json<ListDocumentsResponse>, ApiError> {
    Ok(Json(ListDocumentsResponse {
        documents: documents.list().await?,
    }))
}

pub async fn get_document(
    State(documents): State<Arc<DocumentService>>,
    Path(document_id): Path<String>,
) -> Result<Json<DocumentRecord>, ApiError> {
    Ok(Json(documents.get(&document_id).await?))
}
