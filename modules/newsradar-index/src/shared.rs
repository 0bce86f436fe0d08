use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

use crate::index::{ClusterIndex, Result};

/// Single-writer / many-readers access to the cluster index, plus the
/// periodic snapshot policy.
///
/// `query` takes shared access; `add` and snapshots take the exclusive
/// lock. Query-then-add across two concurrent ingests is deliberately not
/// atomic: a race can mint two clusters for simultaneous near-duplicates,
/// which downstream scoring tolerates.
#[derive(Clone)]
pub struct SharedIndex {
    inner: Arc<RwLock<ClusterIndex>>,
    snapshot_dir: PathBuf,
    snapshot_every: usize,
    inserts: Arc<AtomicUsize>,
}

impl SharedIndex {
    pub fn new(index: ClusterIndex, snapshot_dir: impl Into<PathBuf>, snapshot_every: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
            snapshot_dir: snapshot_dir.into(),
            snapshot_every: snapshot_every.max(1),
            inserts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn article_ids(&self) -> std::collections::HashSet<Uuid> {
        self.inner.read().await.article_ids()
    }

    pub async fn query(&self, vector: &[f32]) -> Result<Option<(f32, Uuid)>> {
        self.inner.read().await.query(vector)
    }

    /// Append a vector; every `snapshot_every` inserts a snapshot task is
    /// spawned off the caller's path.
    pub async fn add(&self, article_id: Uuid, cluster_id: Uuid, vector: &[f32]) -> Result<()> {
        self.inner.write().await.add(article_id, cluster_id, vector)?;

        let count = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if count % self.snapshot_every == 0 {
            self.spawn_snapshot();
        }
        Ok(())
    }

    /// Snapshot in a background task. Failures are logged, never fatal:
    /// the next start-up reconciles against the store.
    pub fn spawn_snapshot(&self) {
        let inner = Arc::clone(&self.inner);
        let dir = self.snapshot_dir.clone();
        tokio::spawn(async move {
            let guard = inner.write().await;
            if let Err(e) = guard.save(&dir) {
                error!(error = %e, "Index snapshot failed");
            }
        });
    }

    /// Synchronous snapshot, for shutdown paths.
    pub async fn snapshot_now(&self) -> Result<()> {
        let guard = self.inner.write().await;
        guard.save(&self.snapshot_dir)?;
        info!(vectors = guard.len(), "Index snapshot complete");
        Ok(())
    }
}
