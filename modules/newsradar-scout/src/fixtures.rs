//! Deterministic scrapers and publishers for tests and local smoke runs.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use newsradar_common::ArticleMessage;
use newsradar_queue::{ArticlePublisher, QueueError};

use crate::scraper::{NewsScraper, ScrapedArticle};

/// Sample financial articles in the shape real feeds produce.
fn sample_articles() -> Vec<ScrapedArticle> {
    let now = Utc::now();
    vec![
        ScrapedArticle {
            url: "https://example.com/news/1".to_string(),
            title: "Tech Giant Announces Major Acquisition of AI Startup".to_string(),
            content: "A leading technology company announced today a $5 billion acquisition \
                      of a prominent artificial intelligence startup. The deal is one of the \
                      largest AI acquisitions this year and is subject to regulatory approval."
                .to_string(),
            published_at: Some(now - ChronoDuration::hours(2)),
        },
        ScrapedArticle {
            url: "https://example.com/news/2".to_string(),
            title: "Federal Reserve Signals Potential Rate Cut in Next Quarter".to_string(),
            content: "Federal Reserve officials indicated today that a rate cut may be on the \
                      table for the next quarter, citing moderating inflation. Stock markets \
                      moved higher and bond yields fell sharply."
                .to_string(),
            published_at: Some(now - ChronoDuration::hours(3)),
        },
        ScrapedArticle {
            url: "https://example.com/news/3".to_string(),
            title: "Energy Sector Faces Supply Chain Disruptions".to_string(),
            content: "Major energy companies are grappling with supply chain disruptions. \
                      Crude oil prices jumped 5% amid concerns about potential supply \
                      constraints persisting for several months."
                .to_string(),
            published_at: Some(now - ChronoDuration::hours(5)),
        },
    ]
}

enum Behaviour {
    Articles(Vec<ScrapedArticle>),
    Fail,
    Slow(Duration),
}

pub struct FixtureScraper {
    name: String,
    behaviour: Behaviour,
}

impl FixtureScraper {
    pub fn sample(name: &str) -> Self {
        Self {
            name: name.to_string(),
            behaviour: Behaviour::Articles(sample_articles()),
        }
    }

    pub fn with_articles(name: &str, articles: Vec<ScrapedArticle>) -> Self {
        Self {
            name: name.to_string(),
            behaviour: Behaviour::Articles(articles),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            behaviour: Behaviour::Fail,
        }
    }

    pub fn slow(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            behaviour: Behaviour::Slow(delay),
        }
    }

    pub fn articles(&self) -> Vec<ScrapedArticle> {
        match &self.behaviour {
            Behaviour::Articles(articles) => articles.clone(),
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl NewsScraper for FixtureScraper {
    async fn fetch(&self) -> Result<Vec<ScrapedArticle>> {
        match &self.behaviour {
            Behaviour::Articles(articles) => Ok(articles.clone()),
            Behaviour::Fail => Err(anyhow!("fixture scraper configured to fail")),
            Behaviour::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(sample_articles())
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn source_url(&self) -> &str {
        "https://example.com"
    }
}

/// Publisher that records everything it is handed.
pub struct CapturingPublisher {
    messages: Mutex<Vec<ArticleMessage>>,
    fail: bool,
}

impl CapturingPublisher {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<ArticleMessage> {
        self.messages.lock().unwrap().clone()
    }
}

impl Default for CapturingPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticlePublisher for CapturingPublisher {
    async fn publish(&self, message: &ArticleMessage) -> Result<(), QueueError> {
        if self.fail {
            return Err(QueueError::PublishExhausted(3));
        }
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}
