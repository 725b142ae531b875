use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::{LlmConfig, PromptsConfig};
use crate::services::conversation::context_builder::render_documents;
use crate::services::conversation::{GenerationRequest, LlmProvider, RetrievalStatus};
use crate::utils::limiters::Limiters;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: usize,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/v1/chat/completions` endpoint.
#[derive(Clone)]
pub struct LlmService {
    client: Client,
    config: LlmConfig,
    system_prompt: String,
    limiters: Limiters,
}

impl LlmService {
    pub fn new(
        config: LlmConfig,
        prompts: &PromptsConfig,
        limiters: Limiters,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build LLM HTTP client")?;

        Ok(Self {
            client,
            config,
            system_prompt: prompts.main_system_prompt.clone(),
            limiters,
        })
    }

    /// System prompt with document context, then history, then the question.
    pub fn build_messages(&self, request: &GenerationRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage::new("system", self.system_message(request)));
        messages.extend(
            request
                .history
                .iter()
                .map(|turn| ChatMessage::new(turn.role.as_str(), turn.content.clone())),
        );
        messages.push(ChatMessage::new("user", request.message.clone()));
        messages
    }

    fn system_message(&self, request: &GenerationRequest) -> String {
        let mut system = self.system_prompt.clone();

        match request.retrieval {
            RetrievalStatus::Unavailable => {
                system.push_str(
                    "\n\nDocument search is currently unavailable. Tell the user that your \
                     answer is not based on their documents.",
                );
                return system;
            }
            RetrievalStatus::NoMatches => {
                system.push_str(
                    "\n\nNo relevant passages were found in the user's documents. Say so \
                     before answering from general knowledge.",
                );
                return system;
            }
            RetrievalStatus::Found => {}
        }

        // The manager has already fitted the documents to the context budget
        system.push_str("\n\nRelevant document excerpts:\n");
        system.push_str(&render_documents(&request.documents));
        system
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let _permit = self.limiters.acquire_llm().await?;
        debug!("Starting chat generation with {} messages", messages.len());

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(format!(
                "{}/v1/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .json(&request)
            .send()
            .await
            .context("Failed to call LLM API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error: {} - {}", status, body);
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        let answer = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("No choices returned from LLM")?;

        if answer.trim().is_empty() {
            anyhow::bail!("LLM returned an empty answer");
        }
        Ok(answer.trim().to_string())
    }
}

#[async_trait::async_trait]
impl LlmProvider for LlmService {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let messages = self.build_messages(request);
        self.complete(&messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::conversation::{RetrievedDocument, Turn};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(base_url: &str) -> LlmService {
        let config = LlmConfig {
            base_url: base_url.to_string(),
            model: "test-model".to_string(),
            timeout_seconds: 5,
            ..LlmConfig::default()
        };
        LlmService::new(
            config,
            &PromptsConfig {
                main_system_prompt: "Answer from the documents.".to_string(),
            },
            Limiters::default(),
        )
        .unwrap()
    }

    fn request(retrieval: RetrievalStatus) -> GenerationRequest {
        GenerationRequest {
            message: "Summarize".to_string(),
            history: vec![Turn::user("earlier"), Turn::assistant("before", vec![])],
            documents: vec![RetrievedDocument {
                document_id: "docA".to_string(),
                title: Some("a.md".to_string()),
                score: 0.9,
                excerpts: vec!["X is true".to_string(), "Y follows".to_string()],
            }],
            retrieval,
        }
    }

    #[test]
    fn test_messages_layout() {
        let messages = service("http://unused").build_messages(&request(RetrievalStatus::Found));

        let roles: Vec<_> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert!(messages[0].content.contains("[Document: a.md | id: docA]"));
        assert!(messages[0].content.contains("Y follows"));
        assert_eq!(messages[3].content, "Summarize");
    }

    #[test]
    fn test_every_given_document_reaches_prompt() {
        let mut req = request(RetrievalStatus::Found);
        req.documents.push(RetrievedDocument {
            document_id: "docB".to_string(),
            title: None,
            score: 0.4,
            excerpts: vec!["short".to_string()],
        });

        let system = service("http://unused").build_messages(&req)[0].content.clone();
        assert!(system.contains("id: docA"));
        assert!(system.contains("[Document: Untitled | id: docB]"));
        assert!(system.contains("short"));
    }

    #[test]
    fn test_unavailable_retrieval_is_stated() {
        let system =
            service("http://unused").build_messages(&request(RetrievalStatus::Unavailable))[0]
                .content
                .clone();
        assert!(system.contains("unavailable"));
        assert!(!system.contains("X is true"));
    }

    #[tokio::test]
    async fn test_generate_posts_completion_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"model": "test-model", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": " Doc A says X \n"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let answer = service(&server.uri())
            .generate(&request(RetrievalStatus::Found))
            .await
            .unwrap();
        assert_eq!(answer, "Doc A says X");
    }

    #[tokio::test]
    async fn test_generate_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = service(&server.uri())
            .generate(&request(RetrievalStatus::Found))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        assert!(service(&server.uri())
            .generate(&request(RetrievalStatus::Found))
            .await
            .is_err());
    }
}
