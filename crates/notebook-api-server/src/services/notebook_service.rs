use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

use crate::models::notebook::{AddCellRequest, Notebook, NotebookCell};
use crate::services::conversation::{DocumentId, DocumentStore, RetrievalScope};
use crate::utils::error::ApiError;

/// Notebooks group documents and cells; a notebook's documents become the
/// default retrieval scope of chats that name it.
pub struct NotebookService {
    notebooks: DashMap<String, Notebook>,
    documents: Arc<dyn DocumentStore>,
}

impl NotebookService {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            notebooks: DashMap::new(),
            documents,
        }
    }

    pub async fn create(
        &self,
        title: &str,
        documents: Option<Vec<DocumentId>>,
    ) -> Result<Notebook, ApiError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ApiError::BadRequest("Notebook title must not be empty".to_string()));
        }

        let mut ids: Vec<DocumentId> = Vec::new();
        for id in documents.unwrap_or_default() {
            let id = id.trim().to_string();
            if id.is_empty() || ids.contains(&id) {
                continue;
            }
            if !self.documents.contains(&id).await? {
                return Err(ApiError::BadRequest(format!("Unknown document: {}", id)));
            }
            ids.push(id);
        }

        let notebook = Notebook {
            id: format!("nb_{}", uuid::Uuid::new_v4().simple()),
            title: title.to_string(),
            documents: ids,
            cells: Vec::new(),
            created_at: Utc::now(),
        };
        self.notebooks.insert(notebook.id.clone(), notebook.clone());

        info!(notebook_id = %notebook.id, documents = notebook.documents.len(), "Notebook created");
        Ok(notebook)
    }

    pub fn get(&self, notebook_id: &str) -> Result<Notebook, ApiError> {
        self.notebooks
            .get(notebook_id)
            .map(|nb| nb.value().clone())
            .ok_or_else(|| ApiError::NotFound(format!("Notebook {} not found", notebook_id)))
    }

    /// Oldest first
    pub fn list(&self) -> Vec<Notebook> {
        let mut notebooks: Vec<Notebook> = self.notebooks.iter().map(|nb| nb.value().clone()).collect();
        notebooks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        notebooks
    }

    pub fn add_cell(&self, notebook_id: &str, request: AddCellRequest) -> Result<Notebook, ApiError> {
        let mut notebook = self
            .notebooks
            .get_mut(notebook_id)
            .ok_or_else(|| ApiError::NotFound(format!("Notebook {} not found", notebook_id)))?;

        notebook.cells.push(NotebookCell {
            id: format!("cell_{}", uuid::Uuid::new_v4().simple()),
            cell_type: request.cell_type,
            content: request.content,
            outputs: request.outputs,
        });
        Ok(notebook.clone())
    }

    /// Retrieval scope for a notebook's documents.
    pub fn scope(&self, notebook_id: &str) -> Result<RetrievalScope, ApiError> {
        Ok(RetrievalScope::from_ids(Some(self.get(notebook_id)?.documents)))
    }

    pub fn len(&self) -> usize {
        self.notebooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notebooks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::DocumentRecord;
    use crate::models::notebook::CellType;
    use crate::services::document_store::InMemoryDocumentStore;

    async fn service() -> NotebookService {
        let store = InMemoryDocumentStore::new();
        store
            .insert(DocumentRecord {
                file_id: "docA".to_string(),
                file_name: "a.pdf".to_string(),
                file_size: 1.5,
                content_type: "application/pdf".to_string(),
                chunk_count: 3,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        NotebookService::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_create_and_scope() {
        let service = service().await;
        let notebook = service
            .create(
                "Research",
                Some(vec!["docA".to_string(), "docA".to_string(), " ".to_string()]),
            )
            .await
            .unwrap();

        assert!(notebook.id.starts_with("nb_"));
        assert_eq!(notebook.documents, vec!["docA".to_string()]);
        assert!(notebook.cells.is_empty());

        let scope = service.scope(&notebook.id).unwrap();
        assert!(scope.allows("docA"));
        assert!(!scope.allows("docB"));
    }

    #[tokio::test]
    async fn test_notebook_without_documents_is_unconstrained() {
        let service = service().await;
        let notebook = service.create("Empty", None).await.unwrap();
        assert!(service.scope(&notebook.id).unwrap().is_unconstrained());
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let service = service().await;
        assert!(matches!(service.create("  ", None).await, Err(ApiError::BadRequest(_))));
        assert!(matches!(
            service.create("x", Some(vec!["ghost".to_string()])).await,
            Err(ApiError::BadRequest(_))
        ));
        assert!(service.is_empty());
    }

    #[tokio::test]
    async fn test_cells_are_appended() {
        let service = service().await;
        let notebook = service.create("Cells", None).await.unwrap();

        let updated = service
            .add_cell(
                &notebook.id,
                AddCellRequest {
                    cell_type: CellType::Markdown,
                    content: "# Notes".to_string(),
                    outputs: None,
                },
            )
            .unwrap();
        assert_eq!(updated.cells.len(), 1);
        assert_eq!(updated.cells[0].cell_type, CellType::Markdown);

        assert!(matches!(
            service.add_cell(
                "nb_missing",
                AddCellRequest {
                    cell_type: CellType::Code,
                    content: String::new(),
                    outputs: None,
                },
            ),
            Err(ApiError::NotFound(_))
        ));
        assert_eq!(service.list().len(), 1);
    }
}
