use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::services::conversation::{ConversationStatus, ManagerError};

/// Opaque conversation key
pub type ChatId = String;

/// Opaque identifier of a document known to the document store
pub type DocumentId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            _ => Err(ManagerError::InvalidRole(s.to_string())),
        }
    }
}

/// One message of a conversation. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Documents consulted for an assistant answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_documents: Option<Vec<DocumentId>>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>, source_documents: Option<Vec<DocumentId>>) -> Self {
        Self {
            role,
            content: content.into(),
            source_documents,
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, None)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content, None)
    }

    pub fn assistant(content: impl Into<String>, citations: Vec<DocumentId>) -> Self {
        Self::new(Role::Assistant, content, Some(citations))
    }
}

// ===== REQUEST MODELS =====

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub chat_id: Option<ChatId>,
    /// Limits retrieval to these documents
    #[serde(default)]
    pub documents: Option<Vec<DocumentId>>,
    /// Use the notebook's documents as scope when `documents` is absent
    #[serde(default)]
    pub notebook_id: Option<String>,
    pub message: String,
    /// Accepted for compatibility; answers are never streamed
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetryRequest {
    #[serde(default)]
    pub documents: Option<Vec<DocumentId>>,
    #[serde(default)]
    pub notebook_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordTurnRequest {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub source_documents: Option<Vec<DocumentId>>,
}

// ===== RESPONSE MODELS =====

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub chat_id: ChatId,
    pub messages: Vec<Turn>,
    pub answer: String,
    pub citations: Vec<DocumentId>,
    pub grounded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub chat_id: ChatId,
    pub status: ConversationStatus,
    pub awaiting_answer: bool,
    pub messages: Vec<Turn>,
}

#[derive(Debug, Serialize)]
pub struct RecordTurnResponse {
    pub chat_id: ChatId,
    pub turn: Turn,
    pub message_count: usize,
}
