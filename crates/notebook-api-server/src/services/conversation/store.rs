use anyhow::{Context, Result};
use dashmap::DashMap;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::Turn;

/// Longest chat id (in bytes) stored under its plain hex name; longer ids are
/// hashed to stay within file name limits.
const MAX_HEX_NAME_BYTES: usize = 100;

/// Append-only turn logs keyed by conversation id.
///
/// Implementations only have to make a single `append` atomic with respect
/// to `load`; serialising writers on one key is the manager's job.
#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    async fn append(&self, chat_id: &str, turn: &Turn) -> Result<()>;

    /// Full history, oldest first. Unknown ids yield an empty log.
    async fn load(&self, chat_id: &str) -> Result<Vec<Turn>>;

    async fn exists(&self, chat_id: &str) -> Result<bool>;

    async fn conversation_count(&self) -> Result<usize>;
}

/// Thread-safe in-process store.
///
/// DashMap shards the key space; each log sits behind its own RwLock so a
/// reader sees either the whole appended turn or none of it.
#[derive(Clone, Default)]
pub struct InMemoryConversationStore {
    storage: Arc<DashMap<String, Arc<RwLock<Vec<Turn>>>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        info!("Initializing in-memory conversation store");
        Self::default()
    }

    fn log(&self, chat_id: &str) -> Option<Arc<RwLock<Vec<Turn>>>> {
        self.storage.get(chat_id).map(|entry| entry.value().clone())
    }
}

#[async_trait::async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append(&self, chat_id: &str, turn: &Turn) -> Result<()> {
        let log = self
            .storage
            .entry(chat_id.to_string())
            .or_insert_with(|| {
                debug!(chat_id, "Creating conversation log");
                Arc::new(RwLock::new(Vec::new()))
            })
            .clone();

        log.write().push(turn.clone());
        Ok(())
    }

    async fn load(&self, chat_id: &str) -> Result<Vec<Turn>> {
        Ok(self
            .log(chat_id)
            .map(|log| log.read().clone())
            .unwrap_or_default())
    }

    async fn exists(&self, chat_id: &str) -> Result<bool> {
        Ok(self.storage.contains_key(chat_id))
    }

    async fn conversation_count(&self) -> Result<usize> {
        Ok(self.storage.len())
    }
}

/// Durable store: one JSON-lines file per conversation under `root`.
///
/// File names are the hex encoding of the chat id, or `sha256-<digest>` for
/// ids too long to encode, so arbitrary ids are safe on disk. Each append writes one complete line and syncs it; `load` ignores
/// a trailing line that is not yet newline-terminated.
#[derive(Clone)]
pub struct FileConversationStore {
    root: PathBuf,
}

impl FileConversationStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("Failed to create conversation dir {}", root.display()))?;
        info!("Conversation logs stored under {}", root.display());
        Ok(Self { root })
    }

    fn path_for(&self, chat_id: &str) -> PathBuf {
        let name = if chat_id.len() <= MAX_HEX_NAME_BYTES {
            hex::encode(chat_id)
        } else {
            format!("sha256-{}", hex::encode(Sha256::digest(chat_id.as_bytes())))
        };
        self.root.join(format!("{}.jsonl", name))
    }
}

#[async_trait::async_trait]
impl ConversationStore for FileConversationStore {
    async fn append(&self, chat_id: &str, turn: &Turn) -> Result<()> {
        let mut line = serde_json::to_vec(turn).context("Failed to serialize turn")?;
        line.push(b'\n');

        let path = self.path_for(chat_id);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        file.write_all(&line)
            .await
            .with_context(|| format!("Failed to append to {}", path.display()))?;
        file.sync_data().await.context("Failed to sync conversation log")?;
        Ok(())
    }

    async fn load(&self, chat_id: &str) -> Result<Vec<Turn>> {
        let path = self.path_for(chat_id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };

        // Only newline-terminated lines are committed
        let committed = match raw.rfind('\n') {
            Some(end) => &raw[..=end],
            None => "",
        };
        if committed.len() < raw.len() {
            warn!(chat_id, "Ignoring partially written trailing turn");
        }

        committed
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str::<Turn>(line)
                    .with_context(|| format!("Corrupt turn #{} in {}", i, path.display()))
            })
            .collect()
    }

    async fn exists(&self, chat_id: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path_for(chat_id)).await?)
    }

    async fn conversation_count(&self) -> Result<usize> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().is_some_and(|ext| ext == "jsonl") {
                count += 1;
            }
        }
        Ok(count)
    }
}
