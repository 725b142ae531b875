pub mod conversation;
pub mod document_service;
pub mod document_store;
pub mod embedding_service;
pub mod llm_service;
pub mod notebook_service;
pub mod rag_service;
pub mod vector_index;

pub use conversation::ConversationManager;
pub use document_service::DocumentService;
pub use document_store::InMemoryDocumentStore;
pub use embedding_service::EmbeddingService;
pub use llm_service::LlmService;
pub use notebook_service::NotebookService;
pub use rag_service::RagService;
pub use vector_index::VectorIndex;
