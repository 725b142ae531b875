use thiserror::Error;

use super::{ChatId, DocumentId};

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Invalid role '{0}': expected user, assistant or system")]
    InvalidRole(String),

    /// Logged and recovered inside the manager, never returned to callers
    #[error("Document '{0}' is outside the permitted retrieval scope")]
    ScopeViolation(DocumentId),

    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("Generation failed for chat {chat_id} (user turn saved: {user_turn_saved}): {reason}")]
    GenerationFailed {
        chat_id: ChatId,
        user_turn_saved: bool,
        reason: String,
    },

    #[error("Chat {0} has no unanswered user turn")]
    NothingToResume(ChatId),

    #[error("Conversation storage error: {0}")]
    Storage(String),
}

impl ManagerError {
    pub fn storage(err: anyhow::Error) -> Self {
        ManagerError::Storage(format!("{:#}", err))
    }
}
