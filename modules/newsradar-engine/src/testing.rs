//! Fakes for scoring and enrichment tests.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;
use uuid::Uuid;

use llm_client::ChatAgent;
use newsradar_common::Article;

enum ChatBehaviour {
    Json(Value),
    Fail,
    Slow(Duration),
}

/// Chat agent with a canned reply, a permanent failure, or a long stall.
pub struct StaticChat {
    behaviour: ChatBehaviour,
}

impl StaticChat {
    pub fn with_json(value: Value) -> Self {
        Self {
            behaviour: ChatBehaviour::Json(value),
        }
    }

    pub fn failing() -> Self {
        Self {
            behaviour: ChatBehaviour::Fail,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            behaviour: ChatBehaviour::Slow(delay),
        }
    }
}

#[async_trait]
impl ChatAgent for StaticChat {
    async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
        match &self.behaviour {
            ChatBehaviour::Json(value) => Ok(value.to_string()),
            ChatBehaviour::Fail => Err(anyhow!("model unreachable")),
            ChatBehaviour::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(String::new())
            }
        }
    }

    async fn generate_json(&self, _system: &str, _user: &str) -> Result<Value> {
        match &self.behaviour {
            ChatBehaviour::Json(value) => Ok(value.clone()),
            ChatBehaviour::Fail => Err(anyhow!("model unreachable")),
            ChatBehaviour::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Value::Null)
            }
        }
    }
}

/// An article pinned to a cluster, published `minutes_ago` minutes back.
pub fn article_in_cluster(
    cluster_id: Uuid,
    source_id: i32,
    title: &str,
    minutes_ago: i64,
) -> Article {
    Article {
        id: Uuid::new_v4(),
        source_id,
        url: format!("https://example.com/{}", Uuid::new_v4()),
        title: title.to_string(),
        content: format!("{title}. Extended coverage of the development."),
        published_at: Utc::now() - ChronoDuration::minutes(minutes_ago),
        created_at: Utc::now(),
        cluster_id: Some(cluster_id),
        companies: vec![],
        people: vec![],
    }
}
