use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chat::DocumentId;

/// Metadata for a registered document. Content lives in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub file_id: DocumentId,
    pub file_name: String,
    /// Size in MB, rounded to two decimals
    pub file_size: f64,
    pub content_type: String,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterDocumentRequest {
    pub file_name: String,
    /// Extracted text of the document
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ListDocumentsResponse {
    pub documents: Vec<DocumentRecord>,
}
