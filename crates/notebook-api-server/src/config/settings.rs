use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub rag: RagConfig,
    pub conversation: ConversationConfig,
    pub documents: DocumentsConfig,
    pub limits: LimitsConfig,
    pub prompts: PromptsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS; empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:5174".to_string(),
            ],
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8081".to_string(),
            model: "default".to_string(),
            timeout_seconds: 120,
            max_tokens: 1024,
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8082".to_string(),
            model: "all-minilm-l6-v2".to_string(),
            dimension: 384,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RagConfig {
    pub retrieval_top_k: usize,
    pub min_similarity: f32,
    /// Excerpts kept per retrieved document
    pub max_excerpts_per_document: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Token budget for the document context handed to the LLM
    pub max_context_tokens: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            retrieval_top_k: 5,
            min_similarity: 0.2,
            max_excerpts_per_document: 3,
            chunk_size: 1000,
            chunk_overlap: 150,
            max_context_tokens: 6000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConversationBackend {
    Memory,
    File,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ConversationConfig {
    pub backend: ConversationBackend,
    /// Directory for the `file` backend (one JSON-lines log per conversation)
    pub data_dir: PathBuf,
    /// Most recent turns passed to the generation engine
    pub history_window: usize,
    pub retrieval_timeout_ms: u64,
    pub generation_timeout_seconds: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            backend: ConversationBackend::Memory,
            data_dir: PathBuf::from("data/conversations"),
            history_window: 10,
            retrieval_timeout_ms: 10_000,
            generation_timeout_seconds: 90,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DocumentsConfig {
    pub max_file_size_mb: f64,
    pub supported_formats: Vec<String>,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 30.0,
            supported_formats: [".pdf", ".docx", ".txt", ".md", ".xlsx", ".csv"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    pub embedding_concurrency: usize,
    pub llm_generate_concurrency: usize,
    pub acquire_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            embedding_concurrency: 8,
            llm_generate_concurrency: 4,
            acquire_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PromptsConfig {
    pub main_system_prompt: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            main_system_prompt: "You are a research assistant answering questions about the user's \
                documents. Base every answer on the provided document excerpts and mention \
                which document each fact comes from. If the excerpts do not contain the answer, \
                say so plainly instead of guessing."
                .to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is unset
    pub level: String,
    pub format: LogFormat,
    /// Daily-rolling log files are written here when set
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,notebook_api_server=debug".to_string(),
            format: LogFormat::Pretty,
            directory: None,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(false))
            // Example: APP_LLM__BASE_URL=http://127.0.0.1:8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }
        if self.rag.chunk_size == 0 {
            anyhow::bail!("rag.chunk_size must be non-zero");
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            anyhow::bail!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                self.rag.chunk_overlap,
                self.rag.chunk_size
            );
        }
        if self.rag.retrieval_top_k == 0 {
            anyhow::bail!("rag.retrieval_top_k must be at least 1");
        }
        if self.conversation.generation_timeout_seconds == 0
            || self.conversation.retrieval_timeout_ms == 0
        {
            anyhow::bail!("conversation timeouts must be non-zero");
        }
        if self.documents.max_file_size_mb <= 0.0 {
            anyhow::bail!("documents.max_file_size_mb must be positive");
        }
        Ok(())
    }
}
