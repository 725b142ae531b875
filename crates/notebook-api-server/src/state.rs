use anyhow::Result;
use axum::extract::FromRef;
use std::sync::Arc;
use tracing::info;

use crate::config::{ConversationBackend, Settings};
use crate::services::conversation::{
    ConversationManager, ConversationStore, DocumentStore, EmbeddingProvider,
    FileConversationStore, InMemoryConversationStore, LlmProvider, ManagerConfig,
};
use crate::services::{
    DocumentService, EmbeddingService, InMemoryDocumentStore, LlmService, NotebookService,
    RagService, VectorIndex,
};
use crate::utils::limiters::Limiters;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub conversation_manager: Arc<ConversationManager>,
    pub document_service: Arc<DocumentService>,
    pub notebook_service: Arc<NotebookService>,
    pub vector_index: Arc<VectorIndex>,
}

impl AppState {
    /// Wire the HTTP-backed engines and the configured conversation store.
    pub async fn build(settings: Settings) -> Result<Self> {
        let limiters = Limiters::new(&settings.limits);

        let embedding = Arc::new(EmbeddingService::new(&settings.embedding, limiters.clone())?);
        let llm = Arc::new(LlmService::new(
            settings.llm.clone(),
            &settings.prompts,
            limiters,
        )?);

        let store: Box<dyn ConversationStore> = match settings.conversation.backend {
            ConversationBackend::Memory => Box::new(InMemoryConversationStore::new()),
            ConversationBackend::File => Box::new(
                FileConversationStore::open(settings.conversation.data_dir.clone()).await?,
            ),
        };

        info!(
            "Engines: llm={} embedding={} (dim {})",
            settings.llm.base_url,
            settings.embedding.base_url,
            embedding.dimension()
        );

        Ok(Self::from_parts(settings, store, embedding, llm))
    }

    /// Assemble the state around already-built engines.
    pub fn from_parts(
        settings: Settings,
        store: Box<dyn ConversationStore>,
        embedding: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        let documents: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let vector_index = Arc::new(VectorIndex::new());

        let rag = Arc::new(RagService::new(
            embedding,
            documents.clone(),
            vector_index.clone(),
            settings.rag.clone(),
        ));

        let conversation_manager = Arc::new(ConversationManager::new(
            store,
            documents.clone(),
            rag.clone(),
            llm,
            ManagerConfig::new(&settings.conversation, &settings.rag),
        ));

        let document_service = Arc::new(DocumentService::new(
            documents.clone(),
            rag,
            settings.documents.clone(),
        ));
        let notebook_service = Arc::new(NotebookService::new(documents));

        Self {
            settings: Arc::new(settings),
            conversation_manager,
            document_service,
            notebook_service,
            vector_index,
        }
    }
}

impl FromRef<AppState> for Arc<ConversationManager> {
    fn from_ref(state: &AppState) -> Self {
        state.conversation_manager.clone()
    }
}

impl FromRef<AppState> for Arc<DocumentService> {
    fn from_ref(state: &AppState) -> Self {
        state.document_service.clone()
    }
}

impl FromRef<AppState> for Arc<NotebookService> {
    fn from_ref(state: &AppState) -> Self {
        state.notebook_service.clone()
    }
}
