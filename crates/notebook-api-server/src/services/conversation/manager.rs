use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::{ConversationConfig, RagConfig};

use super::context_builder::fit_to_budget;
use super::error::ManagerError;
use super::locks::KeyedLocks;
use super::providers::{DocumentStore, LlmProvider, RetrievalProvider};
use super::store::ConversationStore;
use super::types::{
    ChatOutcome, ConversationStatus, GenerationRequest, RetrievalScope, RetrievalStatus,
    RetrievedDocument,
};
use super::{DocumentId, Role, Turn};

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub retrieval_timeout: Duration,
    pub generation_timeout: Duration,
    /// Most recent turns handed to the generation engine
    pub history_window: usize,
    /// Token budget for document excerpts in the generation prompt
    pub context_token_budget: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::from(&ConversationConfig::default())
    }
}

impl ManagerConfig {
    pub fn new(conversation: &ConversationConfig, rag: &RagConfig) -> Self {
        Self {
            context_token_budget: rag.max_context_tokens,
            ..Self::from(conversation)
        }
    }
}

impl From<&ConversationConfig> for ManagerConfig {
    fn from(cfg: &ConversationConfig) -> Self {
        Self {
            retrieval_timeout: Duration::from_millis(cfg.retrieval_timeout_ms),
            generation_timeout: Duration::from_secs(cfg.generation_timeout_seconds),
            history_window: cfg.history_window,
            context_token_budget: RagConfig::default().max_context_tokens,
        }
    }
}

/// Owns every conversation's history and answers questions against the
/// document corpus.
///
/// Mutating calls on one `chat_id` (`record_turn`, `generate_answer`,
/// `resume_answer`) run one at a time in admission order; a whole
/// question/answer exchange holds the conversation for its duration.
/// Reads go straight to the store and never wait on an exchange.
pub struct ConversationManager {
    store: Box<dyn ConversationStore>,
    documents: Arc<dyn DocumentStore>,
    retrieval_provider: Arc<dyn RetrievalProvider>,
    llm_provider: Arc<dyn LlmProvider>,
    locks: KeyedLocks,
    config: ManagerConfig,
}

impl ConversationManager {
    pub fn new(
        store: Box<dyn ConversationStore>,
        documents: Arc<dyn DocumentStore>,
        retrieval_provider: Arc<dyn RetrievalProvider>,
        llm_provider: Arc<dyn LlmProvider>,
        config: ManagerConfig,
    ) -> Self {
        info!(
            "Conversation manager ready (history_window={}, retrieval_timeout={:?}, generation_timeout={:?})",
            config.history_window, config.retrieval_timeout, config.generation_timeout
        );
        Self {
            store,
            documents,
            retrieval_provider,
            llm_provider,
            locks: KeyedLocks::new(),
            config,
        }
    }

    /// Append one turn, creating the conversation on first reference.
    ///
    /// The role is validated before anything is written. References are
    /// only kept on assistant turns.
    pub async fn record_turn(
        &self,
        chat_id: &str,
        role: &str,
        content: impl Into<String>,
        refs: Option<Vec<DocumentId>>,
    ) -> Result<Turn, ManagerError> {
        let role: Role = role.parse()?;

        let refs = match role {
            Role::Assistant => refs,
            _ => {
                if refs.as_ref().is_some_and(|r| !r.is_empty()) {
                    warn!(chat_id, %role, "Discarding document references on non-assistant turn");
                }
                None
            }
        };
        let turn = Turn::new(role, content, refs);

        let _guard = self.locks.acquire(chat_id).await;
        self.append(chat_id, &turn).await?;
        debug!(chat_id, %role, "Turn recorded");

        Ok(turn)
    }

    /// Ranked document ids for `query`, restricted to `scope`.
    pub async fn retrieve(
        &self,
        scope: &RetrievalScope,
        query: &str,
    ) -> Result<Vec<DocumentId>, ManagerError> {
        Ok(self
            .retrieve_documents(scope, query)
            .await?
            .into_iter()
            .map(|doc| doc.document_id)
            .collect())
    }

    /// Like [`retrieve`](Self::retrieve) but keeps titles, scores and excerpts.
    pub async fn retrieve_documents(
        &self,
        scope: &RetrievalScope,
        query: &str,
    ) -> Result<Vec<RetrievedDocument>, ManagerError> {
        self.retrieve_scoped(None, scope, query).await
    }

    /// Record the user turn, retrieve, generate, record the cited answer.
    ///
    /// If generation fails the user turn stays recorded and no assistant
    /// turn is written; [`resume_answer`](Self::resume_answer) retries it.
    pub async fn generate_answer(
        &self,
        chat_id: &str,
        scope: &RetrievalScope,
        message: &str,
    ) -> Result<ChatOutcome, ManagerError> {
        let start = Instant::now();
        let _guard = self.locks.acquire(chat_id).await;

        let history = self.load(chat_id).await?;
        if history.is_empty() {
            info!(chat_id, "Starting new conversation");
        }

        self.append(chat_id, &Turn::user(message)).await?;
        debug!(chat_id, scope_size = ?scope.len(), "User turn recorded");

        self.answer_pending(chat_id, scope, message, history, start)
            .await
    }

    /// Answer the trailing user turn of a conversation left awaiting an
    /// answer, without recording the question again.
    pub async fn resume_answer(
        &self,
        chat_id: &str,
        scope: &RetrievalScope,
    ) -> Result<ChatOutcome, ManagerError> {
        let start = Instant::now();
        let _guard = self.locks.acquire(chat_id).await;

        let mut history = self.load(chat_id).await?;
        let pending = match history.pop() {
            Some(turn) if turn.role == Role::User => turn,
            _ => return Err(ManagerError::NothingToResume(chat_id.to_string())),
        };
        info!(chat_id, "Resuming unanswered user turn");

        self.answer_pending(chat_id, scope, &pending.content, history, start)
            .await
    }

    /// Full ordered history. Unknown ids read as empty and are not created.
    pub async fn messages(&self, chat_id: &str) -> Result<Vec<Turn>, ManagerError> {
        self.load(chat_id).await
    }

    pub async fn status(&self, chat_id: &str) -> Result<ConversationStatus, ManagerError> {
        Ok(if self.load(chat_id).await?.is_empty() {
            ConversationStatus::Empty
        } else {
            ConversationStatus::Active
        })
    }

    /// True when the last recorded turn is an unanswered user message.
    pub async fn awaiting_answer(&self, chat_id: &str) -> Result<bool, ManagerError> {
        Ok(self
            .load(chat_id)
            .await?
            .last()
            .is_some_and(|turn| turn.role == Role::User))
    }

    pub async fn conversation_count(&self) -> Result<usize, ManagerError> {
        self.store
            .conversation_count()
            .await
            .map_err(ManagerError::storage)
    }

    // Caller holds the conversation lock and has already recorded `message`.
    async fn answer_pending(
        &self,
        chat_id: &str,
        scope: &RetrievalScope,
        message: &str,
        history: Vec<Turn>,
        start: Instant,
    ) -> Result<ChatOutcome, ManagerError> {
        let (documents, retrieval) = match self.retrieve_scoped(Some(chat_id), scope, message).await
        {
            Ok(docs) => {
                // Cite only what actually reaches the prompt
                let docs = fit_to_budget(docs, self.config.context_token_budget);
                if docs.is_empty() {
                    (docs, RetrievalStatus::NoMatches)
                } else {
                    (docs, RetrievalStatus::Found)
                }
            }
            Err(e) => {
                warn!(chat_id, error = %e, "Answering without grounding documents");
                (Vec::new(), RetrievalStatus::Unavailable)
            }
        };
        let citations: Vec<DocumentId> = documents.iter().map(|d| d.document_id.clone()).collect();

        let request = GenerationRequest {
            message: message.to_string(),
            history: self.windowed(history),
            documents,
            retrieval,
        };

        let llm_start = Instant::now();
        let answer = match timeout(
            self.config.generation_timeout,
            self.llm_provider.generate(&request),
        )
        .await
        {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => return Err(self.generation_failed(chat_id, format!("{:#}", e))),
            Err(_) => {
                return Err(self.generation_failed(
                    chat_id,
                    format!("generation timed out after {:?}", self.config.generation_timeout),
                ))
            }
        };
        let llm_ms = llm_start.elapsed().as_millis() as u64;

        self.append(chat_id, &Turn::assistant(answer.clone(), citations.clone()))
            .await?;
        let messages = self.load(chat_id).await?;

        info!(
            chat_id,
            citations = citations.len(),
            ?retrieval,
            llm_ms,
            total_ms = start.elapsed().as_millis() as u64,
            "Answer recorded"
        );

        Ok(ChatOutcome {
            chat_id: chat_id.to_string(),
            answer,
            citations,
            messages,
            retrieval,
        })
    }

    async fn retrieve_scoped(
        &self,
        chat_id: Option<&str>,
        scope: &RetrievalScope,
        query: &str,
    ) -> Result<Vec<RetrievedDocument>, ManagerError> {
        let started = Instant::now();

        let found = match timeout(
            self.config.retrieval_timeout,
            self.retrieval_provider.search(query, scope),
        )
        .await
        {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => return Err(ManagerError::RetrievalUnavailable(format!("{:#}", e))),
            Err(_) => {
                return Err(ManagerError::RetrievalUnavailable(format!(
                    "retrieval timed out after {:?}",
                    self.config.retrieval_timeout
                )))
            }
        };

        let returned = found.len();
        let kept = self.enforce_grounding(chat_id, scope, found).await;

        debug!(
            chat_id = chat_id.unwrap_or("-"),
            returned,
            kept = kept.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Retrieval finished"
        );
        Ok(kept)
    }

    /// Drop duplicates and any id outside the scope (or outside the corpus
    /// when unconstrained). Violations are logged, never surfaced.
    async fn enforce_grounding(
        &self,
        chat_id: Option<&str>,
        scope: &RetrievalScope,
        found: Vec<RetrievedDocument>,
    ) -> Vec<RetrievedDocument> {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(found.len());

        for doc in found {
            if !seen.insert(doc.document_id.clone()) {
                continue;
            }

            let permitted = match scope {
                RetrievalScope::Restricted(_) => scope.allows(&doc.document_id),
                RetrievalScope::Unconstrained => {
                    match self.documents.contains(&doc.document_id).await {
                        Ok(known) => known,
                        Err(e) => {
                            warn!(document_id = %doc.document_id, error = %e, "Could not verify document");
                            false
                        }
                    }
                }
            };

            if permitted {
                kept.push(doc);
            } else {
                let violation = ManagerError::ScopeViolation(doc.document_id);
                error!(chat_id = chat_id.unwrap_or("-"), error = %violation, "Dropping citation");
            }
        }

        kept
    }

    fn windowed(&self, mut history: Vec<Turn>) -> Vec<Turn> {
        let start = history.len().saturating_sub(self.config.history_window);
        history.split_off(start)
    }

    fn generation_failed(&self, chat_id: &str, reason: String) -> ManagerError {
        error!(chat_id, %reason, "Generation failed, user turn kept for retry");
        ManagerError::GenerationFailed {
            chat_id: chat_id.to_string(),
            user_turn_saved: true,
            reason,
        }
    }

    async fn load(&self, chat_id: &str) -> Result<Vec<Turn>, ManagerError> {
        self.store.load(chat_id).await.map_err(ManagerError::storage)
    }

    async fn append(&self, chat_id: &str, turn: &Turn) -> Result<(), ManagerError> {
        self.store
            .append(chat_id, turn)
            .await
            .map_err(ManagerError::storage)
    }
}
