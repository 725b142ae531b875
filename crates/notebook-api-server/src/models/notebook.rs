use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chat::DocumentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Markdown,
    Code,
    Ai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookCell {
    pub id: String,
    pub cell_type: CellType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    pub id: String,
    pub title: String,
    pub documents: Vec<DocumentId>,
    pub cells: Vec<NotebookCell>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateNotebookRequest {
    pub title: String,
    #[serde(default)]
    pub documents: Option<Vec<DocumentId>>,
}

#[derive(Debug, Deserialize)]
pub struct AddCellRequest {
    pub cell_type: CellType,
    pub content: String,
    #[serde(default)]
    pub outputs: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct NotebookResponse {
    pub notebook: Notebook,
}

#[derive(Debug, Serialize)]
pub struct ListNotebooksResponse {
    pub notebooks: Vec<Notebook>,
}
