use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use newsradar_common::ArticleMessage;

/// One article as it comes off a source, before queueing.
#[derive(Debug, Clone)]
pub struct ScrapedArticle {
    pub url: String,
    pub title: String,
    pub content: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl ScrapedArticle {
    pub fn into_message(self, source_name: &str) -> ArticleMessage {
        ArticleMessage {
            source_name: source_name.to_string(),
            url: self.url,
            title: self.title,
            content: self.content,
            published_at: self
                .published_at
                .unwrap_or_else(Utc::now)
                .to_rfc3339(),
            companies: vec![],
            people: vec![],
        }
    }
}

// --- NewsScraper trait ---

#[async_trait]
pub trait NewsScraper: Send + Sync {
    async fn fetch(&self) -> Result<Vec<ScrapedArticle>>;
    fn name(&self) -> &str;
    fn source_url(&self) -> &str;
}

// --- RSS/Atom ---

/// Scraper over an RSS or Atom feed. Entry summaries stand in for full
/// bodies; per-site article extraction is out of scope here.
pub struct RssScraper {
    name: String,
    source_url: String,
    feed_url: String,
    client: reqwest::Client,
}

impl RssScraper {
    pub fn new(name: &str, source_url: &str, feed_url: &str) -> Self {
        Self {
            name: name.to_string(),
            source_url: source_url.to_string(),
            feed_url: feed_url.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NewsScraper for RssScraper {
    async fn fetch(&self) -> Result<Vec<ScrapedArticle>> {
        info!(scraper = %self.name, feed = %self.feed_url, "Fetching feed");

        let bytes = self
            .client
            .get(&self.feed_url)
            .send()
            .await
            .context(format!("Failed to fetch feed {}", self.feed_url))?
            .error_for_status()
            .context("Feed returned an error status")?
            .bytes()
            .await
            .context("Failed to read feed body")?;

        let feed = feed_rs::parser::parse(bytes.as_ref())
            .context(format!("Failed to parse feed {}", self.feed_url))?;

        let mut articles = Vec::new();
        for entry in feed.entries {
            let Some(link) = entry.links.first().map(|l| l.href.clone()) else {
                continue;
            };
            let title = entry
                .title
                .as_ref()
                .map(|t| t.content.clone())
                .unwrap_or_default();
            if title.is_empty() {
                continue;
            }

            let content = entry
                .content
                .as_ref()
                .and_then(|c| c.body.clone())
                .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()))
                .unwrap_or_default();

            let published_at = entry.published.or(entry.updated);

            articles.push(ScrapedArticle {
                url: link,
                title,
                content,
                published_at,
            });
        }

        if articles.is_empty() {
            warn!(scraper = %self.name, "Feed yielded no usable entries");
        } else {
            info!(scraper = %self.name, count = articles.len(), "Feed fetched");
        }

        Ok(articles)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn source_url(&self) -> &str {
        &self.source_url
    }
}
