pub mod settings;

pub use settings::{
    ConversationBackend, ConversationConfig, DocumentsConfig, EmbeddingConfig, LimitsConfig,
    LlmConfig, LogFormat, LoggingConfig, PromptsConfig, RagConfig, ServerConfig, Settings,
};
