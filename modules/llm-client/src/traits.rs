use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// ChatAgent Trait
// =============================================================================

/// Text generation against a chat-completion endpoint. Object-safe so it can
/// be injected as `Arc<dyn ChatAgent>`.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    /// Plain completion: system + user prompt in, assistant text out.
    async fn generate(&self, system: &str, user: &str) -> Result<String>;

    /// JSON completion: the prompt must instruct the model to answer with
    /// JSON; the reply is stripped of markdown fences and parsed.
    async fn generate_json(&self, system: &str, user: &str) -> Result<serde_json::Value>;
}

// =============================================================================
// EmbedAgent Trait
// =============================================================================

#[async_trait]
pub trait EmbedAgent: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}
