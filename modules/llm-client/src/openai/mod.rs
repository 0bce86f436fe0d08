mod client;
pub(crate) mod types;

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::schema::StructuredOutput;
use crate::traits::{ChatAgent, EmbedAgent};
use crate::util::strip_code_blocks;
use client::ApiClient;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// OpenAi Agent
// =============================================================================

/// Facade over any OpenAI-compatible endpoint. One instance per provider;
/// chat and embedding models are configured independently so the same
/// shape serves OpenRouter (chat) and an embeddings host.
#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    model: String,
    embedding_model: String,
    base_url: Option<String>,
    timeout: Duration,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            embedding_model: "text-embedding-3-small".to_string(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Per-request deadline for every call made through this agent.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> ApiClient {
        let client = ApiClient::new(&self.api_key, self.timeout);
        match &self.base_url {
            Some(url) => client.with_base_url(url),
            None => client,
        }
    }

    /// Type-safe structured output extraction via `json_schema` response
    /// format.
    pub async fn extract<T: StructuredOutput>(&self, system: &str, user: &str) -> Result<T> {
        let request = types::ChatRequest {
            model: self.model.clone(),
            messages: vec![
                types::WireMessage::system(system),
                types::WireMessage::user(user),
            ],
            temperature: Some(0.0),
            max_tokens: None,
            response_format: Some(types::ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: types::JsonSchemaFormat {
                    name: "structured_response".to_string(),
                    strict: true,
                    schema: T::output_schema(),
                },
            }),
        };

        let content = self.client().chat(&request).await?;

        serde_json::from_str(strip_code_blocks(&content))
            .map_err(|e| anyhow!("Failed to deserialize structured response: {}", e))
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self
            .client()
            .embed(
                &self.embedding_model,
                serde_json::Value::String(text.to_string()),
            )
            .await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No embedding in response"))
    }
}

#[async_trait]
impl ChatAgent for OpenAi {
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let request = types::ChatRequest {
            model: self.model.clone(),
            messages: vec![
                types::WireMessage::system(system),
                types::WireMessage::user(user),
            ],
            temperature: Some(0.5),
            max_tokens: Some(2000),
            response_format: None,
        };
        self.client().chat(&request).await
    }

    async fn generate_json(&self, system: &str, user: &str) -> Result<serde_json::Value> {
        let user = format!("{user}\n\nAnswer ONLY with valid JSON, no extra text.");
        let request = types::ChatRequest {
            model: self.model.clone(),
            messages: vec![
                types::WireMessage::system(system),
                types::WireMessage::user(user),
            ],
            temperature: Some(0.5),
            max_tokens: Some(2000),
            response_format: None,
        };
        let content = self.client().chat(&request).await?;
        serde_json::from_str(strip_code_blocks(&content))
            .map_err(|e| anyhow!("Model reply was not valid JSON: {}", e))
    }
}

#[async_trait]
impl EmbedAgent for OpenAi {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text).await
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let input = serde_json::Value::Array(
            texts.into_iter().map(serde_json::Value::String).collect(),
        );
        self.client().embed(&self.embedding_model, input).await
    }
}
