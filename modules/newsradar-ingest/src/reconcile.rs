use std::collections::HashMap;

use anyhow::Result;
use tracing::{info, warn};
use uuid::Uuid;

use newsradar_index::SharedIndex;
use newsradar_store::ArticleRepo;

use crate::embedder::TextEmbedder;

/// Restore the "every stored article has a vector" invariant after a crash
/// or a stale snapshot: re-embed and re-add whatever the index is missing.
/// Runs before the worker accepts new deliveries.
pub async fn reconcile(
    articles: &dyn ArticleRepo,
    embedder: &dyn TextEmbedder,
    index: &SharedIndex,
) -> Result<usize> {
    let members = articles.cluster_members().await?;
    let present = index.article_ids().await;

    let missing: HashMap<Uuid, Uuid> = members
        .into_iter()
        .filter(|(article_id, _)| !present.contains(article_id))
        .collect();

    if missing.is_empty() {
        info!(vectors = present.len(), "Index consistent with store");
        return Ok(0);
    }

    info!(missing = missing.len(), "Replaying missing vectors into the index");

    let ids: Vec<Uuid> = missing.keys().copied().collect();
    let rows = articles.by_ids(&ids).await?;

    let mut restored = 0usize;
    for article in rows {
        let Some(cluster_id) = missing.get(&article.id).copied() else {
            continue;
        };
        let embedding = match embedder.embed(&article.embedding_text()).await {
            Ok(v) => v,
            Err(e) => {
                warn!(article = %article.id, error = %e, "Re-embedding failed during reconciliation");
                continue;
            }
        };
        index.add(article.id, cluster_id, &embedding).await?;
        restored += 1;
    }

    if restored > 0 {
        if let Err(e) = index.snapshot_now().await {
            warn!(error = %e, "Post-reconciliation snapshot failed");
        }
    }

    info!(restored, "Reconciliation complete");
    Ok(restored)
}
