//! Conversational retrieval manager
//!
//! Owns per-conversation history and produces cited answers:
//! - Append-only turn logs behind a pluggable store (memory / JSON lines)
//! - Per-conversation FIFO serialisation of every mutating call
//! - Scope-restricted retrieval with grounded citations
//! - Graceful degradation when retrieval is down, durable user turns when generation fails

pub mod context_builder;
mod error;
mod locks;
pub mod manager;
pub mod providers;
pub mod store;
pub mod types;

pub use error::ManagerError;
pub use locks::KeyedLocks;
pub use manager::{ConversationManager, ManagerConfig};
pub use providers::{DocumentStore, EmbeddingProvider, LlmProvider, RetrievalProvider};
pub use store::{ConversationStore, FileConversationStore, InMemoryConversationStore};
pub use types::{
    ChatOutcome, ConversationStatus, GenerationRequest, RetrievalScope, RetrievalStatus,
    RetrievedDocument,
};

pub use crate::models::chat::{ChatId, DocumentId, Role, Turn};
