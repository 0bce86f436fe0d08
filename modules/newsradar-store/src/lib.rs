//! Persistence for articles (append-only, cold) and sources (small, hot).
//!
//! Components depend on the [`ArticleRepo`] / [`SourceRepo`] traits; the
//! Postgres implementation lives in [`pg`], an in-memory fake with the same
//! semantics in [`memory`] behind the `test-support` feature.

pub mod error;
pub mod pg;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use newsradar_common::{Article, Source};

pub use error::{Result, StoreError};
pub use pg::PgStore;

// ---------------------------------------------------------------------------
// ArticleRepo
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ArticleRepo: Send + Sync {
    /// Insert one article. The URL is the idempotence key: a second insert
    /// for the same URL fails with [`StoreError::DuplicateUrl`].
    async fn insert(&self, article: &Article) -> Result<()>;

    /// Articles published in `[now − window, now]`, newest first; equal
    /// timestamps are ordered by id so windows are stable.
    async fn recent(&self, window_hours: u32) -> Result<Vec<Article>>;

    /// All members of a cluster, oldest first.
    async fn by_cluster(&self, cluster_id: Uuid) -> Result<Vec<Article>>;

    /// Cluster size restricted to a publication window.
    async fn count_in_cluster(&self, cluster_id: Uuid, window_hours: u32) -> Result<i64>;

    /// Every stored URL — bootstraps the scheduler's seen-URL cache.
    async fn urls(&self) -> Result<Vec<String>>;

    /// (article id, cluster id) for every article with a cluster. Drives
    /// ANN reconciliation at worker start-up.
    async fn cluster_members(&self) -> Result<Vec<(Uuid, Uuid)>>;

    /// Fetch specific articles (reconciliation re-embeds these).
    async fn by_ids(&self, ids: &[Uuid]) -> Result<Vec<Article>>;
}

// ---------------------------------------------------------------------------
// SourceRepo
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SourceRepo: Send + Sync {
    /// Idempotent lookup-or-create by unique name. Concurrent creations
    /// collapse onto one row; losers re-read.
    async fn get_or_create(&self, name: &str, url: &str) -> Result<i32>;

    async fn get(&self, id: i32) -> Result<Option<Source>>;

    async fn list(&self) -> Result<Vec<Source>>;

    /// source id → reputation, for the credibility sub-score.
    async fn reputations(&self) -> Result<HashMap<i32, f64>>;

    /// Administrative reputation update.
    async fn set_reputation(&self, id: i32, reputation: f64) -> Result<()>;
}
