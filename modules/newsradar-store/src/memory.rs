// In-memory store with the same contract as Postgres, for tests that need
// the pipeline but not a database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use newsradar_common::{Article, Source};

use crate::error::{Result, StoreError};
use crate::{ArticleRepo, SourceRepo};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    articles: Vec<Article>,
    sources: Vec<Source>,
    next_source_id: i32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn article_count(&self) -> usize {
        self.inner.lock().unwrap().articles.len()
    }
}

#[async_trait]
impl ArticleRepo for MemoryStore {
    async fn insert(&self, article: &Article) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.articles.iter().any(|a| a.url == article.url) {
            return Err(StoreError::DuplicateUrl(article.url.clone()));
        }
        inner.articles.push(article.clone());
        Ok(())
    }

    async fn recent(&self, window_hours: u32) -> Result<Vec<Article>> {
        let cutoff = Utc::now() - Duration::hours(window_hours as i64);
        let now = Utc::now();
        let mut articles: Vec<Article> = self
            .inner
            .lock()
            .unwrap()
            .articles
            .iter()
            .filter(|a| a.published_at >= cutoff && a.published_at <= now)
            .cloned()
            .collect();
        articles.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then(b.id.cmp(&a.id))
        });
        Ok(articles)
    }

    async fn by_cluster(&self, cluster_id: Uuid) -> Result<Vec<Article>> {
        let mut articles: Vec<Article> = self
            .inner
            .lock()
            .unwrap()
            .articles
            .iter()
            .filter(|a| a.cluster_id == Some(cluster_id))
            .cloned()
            .collect();
        articles.sort_by(|a, b| {
            a.published_at
                .cmp(&b.published_at)
                .then(a.id.cmp(&b.id))
        });
        Ok(articles)
    }

    async fn count_in_cluster(&self, cluster_id: Uuid, window_hours: u32) -> Result<i64> {
        let cutoff = Utc::now() - Duration::hours(window_hours as i64);
        let count = self
            .inner
            .lock()
            .unwrap()
            .articles
            .iter()
            .filter(|a| a.cluster_id == Some(cluster_id) && a.published_at >= cutoff)
            .count();
        Ok(count as i64)
    }

    async fn urls(&self) -> Result<Vec<String>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .articles
            .iter()
            .map(|a| a.url.clone())
            .collect())
    }

    async fn cluster_members(&self) -> Result<Vec<(Uuid, Uuid)>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .articles
            .iter()
            .filter_map(|a| a.cluster_id.map(|c| (a.id, c)))
            .collect())
    }

    async fn by_ids(&self, ids: &[Uuid]) -> Result<Vec<Article>> {
        let mut articles: Vec<Article> = self
            .inner
            .lock()
            .unwrap()
            .articles
            .iter()
            .filter(|a| ids.contains(&a.id))
            .cloned()
            .collect();
        articles.sort_by(|a, b| {
            a.published_at
                .cmp(&b.published_at)
                .then(a.id.cmp(&b.id))
        });
        Ok(articles)
    }
}

#[async_trait]
impl SourceRepo for MemoryStore {
    async fn get_or_create(&self, name: &str, url: &str) -> Result<i32> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.sources.iter().find(|s| s.name == name) {
            return Ok(existing.id);
        }
        inner.next_source_id += 1;
        let id = inner.next_source_id;
        inner.sources.push(Source {
            id,
            name: name.to_string(),
            url: url.to_string(),
            reputation: 0.5,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn get(&self, id: i32) -> Result<Option<Source>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sources
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Source>> {
        Ok(self.inner.lock().unwrap().sources.clone())
    }

    async fn reputations(&self) -> Result<HashMap<i32, f64>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sources
            .iter()
            .map(|s| (s.id, s.reputation))
            .collect())
    }

    async fn set_reputation(&self, id: i32, reputation: f64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.sources.iter_mut().find(|s| s.id == id) {
            Some(source) => {
                source.reputation = reputation;
                Ok(())
            }
            None => Err(StoreError::SourceNotFound(id)),
        }
    }
}
