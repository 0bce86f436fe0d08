use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::info;
use uuid::Uuid;

use newsradar_common::{AnalysisReport, Article, HotnessBreakdown, RadarError, Story};
use newsradar_store::{ArticleRepo, SourceRepo};

use crate::enrichment::Enricher;
use crate::hotness::HotnessScorer;
use crate::learned::{blend, cluster_learned, LearnedScorer};

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub learned_weight: f64,
    pub hot_threshold: f64,
    pub enrich_concurrency: usize,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            learned_weight: 0.3,
            hot_threshold: 0.7,
            enrich_concurrency: 4,
        }
    }
}

/// A cluster with both score branches computed. The blend is applied once,
/// at ranking time.
#[derive(Debug, Clone)]
pub struct ScoredCluster {
    pub cluster_id: Uuid,
    pub articles: Vec<Article>,
    pub hotness: HotnessBreakdown,
    pub learned: f64,
    pub score: f64,
}

/// The ranking & enrichment job: snapshot a window, group into clusters,
/// score, rank, and synthesise stories for the top K.
pub struct Analyzer {
    articles: Arc<dyn ArticleRepo>,
    sources: Arc<dyn SourceRepo>,
    scorer: HotnessScorer,
    learned: Arc<dyn LearnedScorer>,
    enricher: Enricher,
    options: AnalyzeOptions,
}

impl Analyzer {
    pub fn new(
        articles: Arc<dyn ArticleRepo>,
        sources: Arc<dyn SourceRepo>,
        scorer: HotnessScorer,
        learned: Arc<dyn LearnedScorer>,
        enricher: Enricher,
        options: AnalyzeOptions,
    ) -> Self {
        Self {
            articles,
            sources,
            scorer,
            learned,
            enricher,
            options,
        }
    }

    pub fn is_hot(&self, score: f64) -> bool {
        score >= self.options.hot_threshold
    }

    /// Rank every cluster in the window and enrich the top `top_k`.
    /// Enrichment is total, so the report is valid even with the model down.
    pub async fn analyse(
        &self,
        window_hours: u32,
        top_k: usize,
        concurrent: bool,
    ) -> Result<AnalysisReport, RadarError> {
        let recent = self
            .articles
            .recent(window_hours)
            .await
            .map_err(anyhow::Error::new)?;
        info!(window_hours, articles = recent.len(), "Analysis window fetched");

        let mut clusters: BTreeMap<Uuid, Vec<Article>> = BTreeMap::new();
        for article in recent {
            if let Some(cluster_id) = article.cluster_id {
                clusters.entry(cluster_id).or_default().push(article);
            }
        }
        let total_clusters = clusters.len();
        let total_articles_analyzed = clusters.values().map(Vec::len).sum();

        let mut scored = self.score_clusters(clusters).await?;

        // Blended score descending; equal scores fall back to cluster id so
        // rankings are reproducible.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.cluster_id.cmp(&b.cluster_id))
        });
        scored.truncate(top_k);

        info!(
            total_clusters,
            selected = scored.len(),
            concurrent,
            "Clusters ranked; enriching"
        );

        let mut results = if concurrent {
            let semaphore = Arc::new(Semaphore::new(self.options.enrich_concurrency.max(1)));
            let futures = scored.iter().map(|cluster| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    let _permit = semaphore.acquire().await.ok();
                    self.enrich_cluster(cluster).await
                }
            });
            join_all(futures).await
        } else {
            let mut stories = Vec::with_capacity(scored.len());
            for cluster in &scored {
                stories.push(self.enrich_cluster(cluster).await);
            }
            stories
        };

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.cluster_id.cmp(&b.cluster_id))
        });

        Ok(AnalysisReport {
            results,
            total_clusters,
            total_articles_analyzed,
        })
    }

    /// Score one cluster by id; None when it has no articles.
    pub async fn assess_cluster(&self, cluster_id: Uuid) -> Result<Option<ScoredCluster>, RadarError> {
        let articles = self
            .articles
            .by_cluster(cluster_id)
            .await
            .map_err(anyhow::Error::new)?;
        if articles.is_empty() {
            return Ok(None);
        }

        let reputations = self
            .sources
            .reputations()
            .await
            .map_err(anyhow::Error::new)?;
        Ok(Some(self.score_one(cluster_id, articles, &reputations).await))
    }

    pub async fn enrich_cluster(&self, cluster: &ScoredCluster) -> Story {
        self.enricher
            .enrich(
                cluster.cluster_id,
                &cluster.articles,
                cluster.hotness,
                cluster.learned,
                cluster.score,
            )
            .await
    }

    async fn score_clusters(
        &self,
        clusters: BTreeMap<Uuid, Vec<Article>>,
    ) -> Result<Vec<ScoredCluster>, RadarError> {
        let reputations = self
            .sources
            .reputations()
            .await
            .map_err(anyhow::Error::new)?;

        let mut scored = Vec::with_capacity(clusters.len());
        for (cluster_id, articles) in clusters {
            scored.push(self.score_one(cluster_id, articles, &reputations).await);
        }
        Ok(scored)
    }

    async fn score_one(
        &self,
        cluster_id: Uuid,
        mut articles: Vec<Article>,
        reputations: &std::collections::HashMap<i32, f64>,
    ) -> ScoredCluster {
        // Timeline order regardless of how the articles were fetched.
        articles.sort_by(|a, b| a.published_at.cmp(&b.published_at).then(a.id.cmp(&b.id)));

        let hotness = self.scorer.score(&articles, reputations);
        let per_article = self.learned.score_articles(&articles).await;
        let learned = cluster_learned(&per_article);
        let score = blend(hotness.total, learned, self.options.learned_weight);

        ScoredCluster {
            cluster_id,
            articles,
            hotness,
            learned,
            score,
        }
    }
}
