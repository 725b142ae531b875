use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::DocumentsConfig;
use crate::models::document::DocumentRecord;
use crate::services::conversation::DocumentStore;
use crate::services::rag_service::RagService;
use crate::utils::error::ApiError;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Document registration: validate, index for retrieval, record metadata.
pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
    rag: Arc<RagService>,
    config: DocumentsConfig,
}

impl DocumentService {
    pub fn new(store: Arc<dyn DocumentStore>, rag: Arc<RagService>, config: DocumentsConfig) -> Self {
        Self { store, rag, config }
    }

    /// Register extracted document text: validate -> chunk -> embed -> save -> index
    pub async fn register(&self, file_name: &str, content: &str) -> Result<DocumentRecord, ApiError> {
        let file_name = file_name.trim();
        info!("Registering document: {} ({} bytes)", file_name, content.len());

        self.check_format(file_name)?;

        let size_mb = content.len() as f64 / BYTES_PER_MB;
        if size_mb > self.config.max_file_size_mb {
            return Err(ApiError::PayloadTooLarge(format!(
                "File too large: {:.2}MB (max {}MB)",
                size_mb, self.config.max_file_size_mb
            )));
        }
        if content.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "No text content found in document".to_string(),
            ));
        }

        let file_id = uuid::Uuid::new_v4().to_string();
        let embedded = self
            .rag
            .embed_document(&file_id, content)
            .await
            .map_err(|e| ApiError::ServiceUnavailable(format!("Failed to index document: {:#}", e)))?;

        let record = DocumentRecord {
            file_id,
            file_name: file_name.to_string(),
            file_size: (size_mb * 100.0).round() / 100.0,
            content_type: mime_guess::from_path(file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
            chunk_count: embedded.len(),
            created_at: Utc::now(),
        };

        // Record first: anything the index returns must already be known
        self.store.insert(record.clone()).await?;
        self.rag.publish(&record.file_id, embedded);

        info!(
            "Document {} registered with {} chunks",
            record.file_id, record.chunk_count
        );
        Ok(record)
    }

    pub async fn list(&self) -> Result<Vec<DocumentRecord>, ApiError> {
        Ok(self.store.list().await?)
    }

    pub async fn get(&self, document_id: &str) -> Result<DocumentRecord, ApiError> {
        self.store
            .get(document_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Document {} not found", document_id)))
    }

    fn check_format(&self, file_name: &str) -> Result<(), ApiError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ApiError::BadRequest("No file extension found".to_string()))?
            .to_lowercase();
        debug!("Detected file type: {}", extension);

        let dotted = format!(".{}", extension);
        if self
            .config
            .supported_formats
            .iter()
            .any(|f| f.eq_ignore_ascii_case(&dotted))
        {
            Ok(())
        } else {
            Err(ApiError::BadRequest(format!(
                "Unsupported file format: {}. Supported: {}",
                dotted,
                self.config.supported_formats.join(", ")
            )))
        }
    }
}
