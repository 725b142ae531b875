//! Collaborator seams of the conversation manager

use anyhow::Result;

use super::types::{GenerationRequest, RetrievalScope, RetrievedDocument};
use crate::models::document::DocumentRecord;

/// Resolves document ids to metadata; owns the corpus listing.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, record: DocumentRecord) -> Result<()>;
    async fn get(&self, document_id: &str) -> Result<Option<DocumentRecord>>;
    async fn contains(&self, document_id: &str) -> Result<bool>;
    async fn list(&self) -> Result<Vec<DocumentRecord>>;
}

/// Trait for embedding service
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Similarity search over the indexed corpus.
///
/// Implementations should honour `scope`, but the manager re-checks every
/// returned id.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RetrievalProvider: Send + Sync {
    async fn search(&self, query: &str, scope: &RetrievalScope) -> Result<Vec<RetrievedDocument>>;
}

/// Trait for LLM service
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}
