use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::models::notebook::*;
use crate::services::NotebookService;
use crate::utils::error::ApiError;

pub async fn create_notebook(
    State(notebooks): State<Arc<NotebookService>>,
    Json(request): Json<CreateNotebookRequest>,
) -> Result<(StatusCode, Json<NotebookResponse>), ApiError> {
    let notebook = notebooks.create(&request.title, request.documents).await?;
    Ok((StatusCode::CREATED, Json(NotebookResponse { notebook })))
}

pub async fn list_notebooks(
    State(notebooks): State<Arc<NotebookService>>,
) -> Json<ListNotebooksResponse> {
    Json(ListNotebooksResponse {
        notebooks: notebooks.list(),
    })
}

pub async fn get_notebook(
    State(notebooks): State<Arc<NotebookService>>,
    Path(notebook_id): Path<String>,
) -> Result<Json<NotebookResponse>, ApiError> {
    Ok(Json(NotebookResponse {
        notebook: notebooks.get(&notebook_id)?,
    }))
}

pub async fn add_cell(
    State(notebooks): State<Arc<NotebookService>>,
    Path(notebook_id): Path<String>,
    Json(request): Json<AddCellRequest>,
) -> Result<(StatusCode, Json<NotebookResponse>), ApiError> {
    let notebook = notebooks.add_cell(&notebook_id, request)?;
    Ok((StatusCode::CREATED, Json(NotebookResponse { notebook })))
}
