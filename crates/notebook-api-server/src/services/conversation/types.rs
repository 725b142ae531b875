use serde::Serialize;
use std::collections::BTreeSet;

use super::{ChatId, DocumentId, Turn};

/// Allow-list of documents a retrieval may draw from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RetrievalScope {
    /// Search the whole indexed corpus
    #[default]
    Unconstrained,
    Restricted(BTreeSet<DocumentId>),
}

impl RetrievalScope {
    /// Absent and empty lists are both unconstrained.
    pub fn from_ids(ids: Option<Vec<DocumentId>>) -> Self {
        let ids: BTreeSet<DocumentId> = ids
            .unwrap_or_default()
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        if ids.is_empty() {
            RetrievalScope::Unconstrained
        } else {
            RetrievalScope::Restricted(ids)
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        matches!(self, RetrievalScope::Unconstrained)
    }

    pub fn allows(&self, document_id: &str) -> bool {
        match self {
            RetrievalScope::Unconstrained => true,
            RetrievalScope::Restricted(ids) => ids.contains(document_id),
        }
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            RetrievalScope::Unconstrained => None,
            RetrievalScope::Restricted(ids) => Some(ids.len()),
        }
    }
}

impl From<Option<Vec<DocumentId>>> for RetrievalScope {
    fn from(ids: Option<Vec<DocumentId>>) -> Self {
        Self::from_ids(ids)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Empty,
    Active,
}

/// A document returned by the retrieval engine, best match first.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDocument {
    pub document_id: DocumentId,
    pub title: Option<String>,
    pub score: f32,
    /// Matching passages, best first
    pub excerpts: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStatus {
    Found,
    NoMatches,
    Unavailable,
}

/// Everything the generation engine receives for one answer.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub message: String,
    /// Prior turns, oldest first, excluding `message`
    pub history: Vec<Turn>,
    pub documents: Vec<RetrievedDocument>,
    pub retrieval: RetrievalStatus,
}

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub chat_id: ChatId,
    pub answer: String,
    /// Exactly the documents recorded on the assistant turn
    pub citations: Vec<DocumentId>,
    pub messages: Vec<Turn>,
    pub retrieval: RetrievalStatus,
}

impl ChatOutcome {
    pub fn grounded(&self) -> bool {
        !self.citations.is_empty()
    }

    /// Caller-facing note when the answer has no grounding documents.
    pub fn notice(&self) -> Option<String> {
        match self.retrieval {
            RetrievalStatus::Found if self.grounded() => None,
            RetrievalStatus::Unavailable => Some(
                "Document search is unavailable; no grounding documents were found for this answer."
                    .to_string(),
            ),
            _ => Some("No grounding documents were found for this question.".to_string()),
        }
    }
}
