use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

use crate::document::Chunk;
use crate::services::conversation::{DocumentId, RetrievalScope, RetrievedDocument};
use crate::utils::cosine_similarity;

#[derive(Debug, Clone)]
struct IndexedChunk {
    document_id: DocumentId,
    chunk_index: usize,
    content: String,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub top_k: usize,
    pub min_similarity: f32,
    pub max_excerpts: usize,
}

/// Brute-force cosine index over document chunks.
#[derive(Default)]
pub struct VectorIndex {
    chunks: RwLock<Vec<IndexedChunk>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every chunk of `document_id` with `chunks`.
    pub fn upsert_document(&self, document_id: &str, chunks: Vec<(Chunk, Vec<f32>)>) {
        let mut guard = self.chunks.write();
        guard.retain(|c| c.document_id != document_id);
        guard.extend(chunks.into_iter().map(|(chunk, embedding)| IndexedChunk {
            document_id: document_id.to_string(),
            chunk_index: chunk.index,
            content: chunk.content,
            embedding,
        }));
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.read().len()
    }

    /// Documents ranked by their best chunk, each with its best excerpts.
    pub fn search(
        &self,
        query: &[f32],
        scope: &RetrievalScope,
        params: SearchParams,
    ) -> Vec<RetrievedDocument> {
        let guard = self.chunks.read();

        let mut hits: HashMap<&str, Vec<(f32, &IndexedChunk)>> = HashMap::new();
        for chunk in guard.iter() {
            if !scope.allows(&chunk.document_id) {
                continue;
            }
            let Some(score) = cosine_similarity(query, &chunk.embedding) else {
                continue;
            };
            if score >= params.min_similarity {
                hits.entry(chunk.document_id.as_str())
                    .or_default()
                    .push((score, chunk));
            }
        }

        let mut documents: Vec<RetrievedDocument> = hits
            .into_iter()
            .map(|(document_id, mut matches)| {
                matches.sort_by(|a, b| {
                    b.0.total_cmp(&a.0)
                        .then_with(|| a.1.chunk_index.cmp(&b.1.chunk_index))
                });
                RetrievedDocument {
                    document_id: document_id.to_string(),
                    title: None,
                    score: matches[0].0,
                    excerpts: matches
                        .iter()
                        .take(params.max_excerpts.max(1))
                        .map(|(_, c)| c.content.clone())
                        .collect(),
                }
            })
            .collect();

        documents.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        documents.truncate(params.top_k);

        debug!(
            indexed = guard.len(),
            matched = documents.len(),
            "Vector search finished"
        );
        documents
    }
}
