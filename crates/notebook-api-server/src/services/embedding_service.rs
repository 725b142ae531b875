use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::services::conversation::EmbeddingProvider;
use crate::utils::limiters::Limiters;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    content: &'a str,
    // Sent as well for OpenAI-style servers
    input: &'a str,
    model: &'a str,
}

/// Client for a llama.cpp-compatible `/embedding` endpoint.
#[derive(Clone)]
pub struct EmbeddingService {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
    limiters: Limiters,
}

impl EmbeddingService {
    pub fn new(config: &EmbeddingConfig, limiters: Limiters) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build embedding HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
            limiters,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let _permit = self.limiters.acquire_embedding().await?;
        debug!("Generating embedding for {} chars", text.len());

        let request = EmbeddingRequest {
            content: text,
            input: text,
            model: &self.model,
        };

        let url = format!("{}/embedding", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to connect to embedding server")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding API error ({}): {}", status, body);
        }

        let json_value: Value = response
            .json()
            .await
            .context("Failed to parse embedding response as JSON")?;

        let embedding = parse_embedding(&json_value)?;

        if embedding.is_empty() {
            anyhow::bail!("Generated embedding is empty");
        }
        if embedding.len() != self.dimension {
            anyhow::bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            );
        }

        Ok(embedding)
    }
}

/// Accepts the response shapes seen in the wild:
/// `{"embedding": [..]}`, `[{"embedding": [..]}]`, `[..]`,
/// `{"data": [{"embedding": [..]}]}` and llama.cpp's nested `[[..]]`.
fn parse_embedding(value: &Value) -> Result<Vec<f32>> {
    let vector = match value {
        Value::Object(obj) => match (obj.get("embedding"), obj.get("data")) {
            (Some(Value::Array(values)), _) => values,
            (_, Some(Value::Array(data))) => data
                .first()
                .and_then(|item| item.get("embedding"))
                .and_then(Value::as_array)
                .with_context(|| format!("Unrecognized embedding response format: {}", value))?,
            _ => anyhow::bail!("Unrecognized embedding response format: {}", value),
        },
        Value::Array(items) => match items.first() {
            None => anyhow::bail!("Empty array returned from embedding server"),
            Some(Value::Object(first)) => first
                .get("embedding")
                .and_then(Value::as_array)
                .with_context(|| format!("Unrecognized embedding response format: {}", value))?,
            _ => items,
        },
        _ => anyhow::bail!("Unrecognized embedding response format: {}", value),
    };

    // llama.cpp may wrap a single pooled vector in another array
    let vector = match vector.first() {
        Some(Value::Array(inner)) => inner,
        _ => vector,
    };

    Ok(vector
        .iter()
        .filter_map(|v| v.as_f64().map(|f| f as f32))
        .collect())
}

#[async_trait::async_trait]
impl EmbeddingProvider for EmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text).await
    }
}
