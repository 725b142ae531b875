use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::RagConfig;
use crate::document::{Chunk, TextChunker};
use crate::services::conversation::{
    DocumentStore, EmbeddingProvider, RetrievalProvider, RetrievalScope, RetrievedDocument,
};
use crate::services::vector_index::{SearchParams, VectorIndex};

/// Embedding-backed retrieval over the in-process vector index.
pub struct RagService {
    embedding: Arc<dyn EmbeddingProvider>,
    documents: Arc<dyn DocumentStore>,
    index: Arc<VectorIndex>,
    config: RagConfig,
}

impl RagService {
    pub fn new(
        embedding: Arc<dyn EmbeddingProvider>,
        documents: Arc<dyn DocumentStore>,
        index: Arc<VectorIndex>,
        config: RagConfig,
    ) -> Self {
        Self {
            embedding,
            documents,
            index,
            config,
        }
    }

    /// Chunk and embed one document's text without making it searchable.
    pub async fn embed_document(
        &self,
        document_id: &str,
        text: &str,
    ) -> Result<Vec<(Chunk, Vec<f32>)>> {
        let chunks: Vec<Chunk> =
            TextChunker::new(self.config.chunk_size, self.config.chunk_overlap).chunk(text)?;
        if chunks.is_empty() {
            anyhow::bail!("No text content found in document");
        }

        let mut embedded = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding = self
                .embedding
                .embed(&chunk.content)
                .await
                .with_context(|| format!("Failed to embed chunk {} of {}", chunk.index, document_id))?;
            embedded.push((chunk, embedding));
        }
        debug!(document_id, chunks = embedded.len(), "Document embedded");
        Ok(embedded)
    }

    /// Make embedded chunks searchable. Returns the chunk count.
    pub fn publish(&self, document_id: &str, embedded: Vec<(Chunk, Vec<f32>)>) -> usize {
        let count = embedded.len();
        self.index.upsert_document(document_id, embedded);
        info!(document_id, chunks = count, "Document indexed");
        count
    }

    fn params(&self) -> SearchParams {
        SearchParams {
            top_k: self.config.retrieval_top_k,
            min_similarity: self.config.min_similarity,
            max_excerpts: self.config.max_excerpts_per_document,
        }
    }
}

#[async_trait::async_trait]
impl RetrievalProvider for RagService {
    async fn search(&self, query: &str, scope: &RetrievalScope) -> Result<Vec<RetrievedDocument>> {
        debug!(scope_size = ?scope.len(), "Retrieving context for query ({} chars)", query.len());

        let query_embedding = self
            .embedding
            .embed(query)
            .await
            .context("Failed to embed query")?;

        let mut found = self.index.search(&query_embedding, scope, self.params());

        for doc in found.iter_mut() {
            match self.documents.get(&doc.document_id).await {
                Ok(Some(record)) => doc.title = Some(record.file_name),
                Ok(None) => {}
                Err(e) => warn!(document_id = %doc.document_id, error = %e, "Failed to load document title"),
            }
        }

        debug!("Retrieved {} documents", found.len());
        Ok(found)
    }
}
