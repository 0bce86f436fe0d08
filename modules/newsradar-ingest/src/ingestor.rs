use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use newsradar_common::{Article, ArticleMessage, RadarError};
use newsradar_index::SharedIndex;
use newsradar_store::{ArticleRepo, SourceRepo, StoreError};

use crate::classifier::RelevanceClassifier;
use crate::embedder::TextEmbedder;

/// Tolerated gap in minutes between a claimed publication time and the
/// ingestion clock. Anything further in the future is clamped to now.
const PUBLISH_SKEW_MINUTES: i64 = 5;

#[derive(Debug)]
pub enum IngestOutcome {
    Inserted {
        article: Article,
        cluster_id: Uuid,
        new_cluster: bool,
    },
    /// The URL was already stored; nothing was written, including the ANN
    /// index.
    Duplicate { url: String },
    Rejected { reason: String },
}

/// The per-article pipeline shared by the queue worker and the synchronous
/// ingest endpoint: classify → timestamp → source → embed → cluster-assign
/// → persist → index.
pub struct Ingestor {
    articles: Arc<dyn ArticleRepo>,
    sources: Arc<dyn SourceRepo>,
    index: SharedIndex,
    embedder: Arc<dyn TextEmbedder>,
    classifier: RelevanceClassifier,
    similarity_threshold: f32,
}

impl Ingestor {
    pub fn new(
        articles: Arc<dyn ArticleRepo>,
        sources: Arc<dyn SourceRepo>,
        index: SharedIndex,
        embedder: Arc<dyn TextEmbedder>,
        classifier: RelevanceClassifier,
        similarity_threshold: f32,
    ) -> Self {
        Self {
            articles,
            sources,
            index,
            embedder,
            classifier,
            similarity_threshold,
        }
    }

    pub async fn ingest(&self, message: &ArticleMessage) -> Result<IngestOutcome, RadarError> {
        let admission = self.classifier.admit(&message.title, &message.content).await;
        if !admission.is_admitted() {
            info!(url = %message.url, ?admission, "Article rejected by classifier");
            return Ok(IngestOutcome::Rejected {
                reason: format!("{admission:?}"),
            });
        }

        let now = Utc::now();
        let published_at = parse_published_at(&message.published_at, now);

        let source_id = self
            .sources
            .get_or_create(&message.source_name, &message.url)
            .await
            .map_err(anyhow::Error::new)?;

        let article_id = Uuid::new_v4();
        let text = format!("{} {}", message.title, message.content);
        let embedding = self.embedder.embed(&text).await?;

        let (cluster_id, new_cluster) = match self.index.query(&embedding).await.map_err(anyhow::Error::new)? {
            Some((similarity, neighbour)) if similarity >= self.similarity_threshold => {
                info!(
                    url = %message.url,
                    similarity,
                    cluster = %neighbour,
                    "Attached to existing cluster"
                );
                (neighbour, false)
            }
            nearest => {
                let fresh = Uuid::new_v4();
                info!(
                    url = %message.url,
                    nearest_similarity = nearest.map(|(s, _)| s),
                    cluster = %fresh,
                    "Minted new cluster"
                );
                (fresh, true)
            }
        };

        let article = Article {
            id: article_id,
            source_id,
            url: message.url.clone(),
            title: message.title.clone(),
            content: message.content.clone(),
            published_at,
            created_at: now,
            cluster_id: Some(cluster_id),
            companies: message.companies.clone(),
            people: message.people.clone(),
        };

        match self.articles.insert(&article).await {
            Ok(()) => {}
            Err(StoreError::DuplicateUrl(url)) => {
                info!(url = %url, "Duplicate URL absorbed; skipping index write");
                return Ok(IngestOutcome::Duplicate { url });
            }
            Err(e) => return Err(anyhow::Error::new(e).into()),
        }

        // Insert and index-add are not one transaction. If the add fails the
        // article stays persisted and start-up reconciliation restores the
        // vector; redelivering the message here would only hit the
        // duplicate path and never reach the index.
        if let Err(e) = self.index.add(article_id, cluster_id, &embedding).await {
            warn!(article = %article_id, error = %e, "Index add failed; reconciliation will restore it");
        }

        Ok(IngestOutcome::Inserted {
            article,
            cluster_id,
            new_cluster,
        })
    }
}

/// Lenient ISO 8601 parse. Unparsable timestamps become "now" (logged);
/// timestamps further than the skew tolerance in the future are clamped.
pub fn parse_published_at(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|naive| naive.and_utc())
        });

    let published_at = match parsed {
        Ok(dt) => dt,
        Err(e) => {
            warn!(raw, error = %e, "Unparsable publication timestamp; substituting now");
            return now;
        }
    };

    if published_at > now + Duration::minutes(PUBLISH_SKEW_MINUTES) {
        warn!(raw, "Publication timestamp in the future; clamping to now");
        return now;
    }

    published_at
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_z_and_offset_timestamps() {
        let now = Utc::now();
        let z = parse_published_at("2026-01-15T10:30:00Z", now);
        assert_eq!(z.to_rfc3339(), "2026-01-15T10:30:00+00:00");

        let offset = parse_published_at("2026-01-15T13:30:00+03:00", now);
        assert_eq!(offset, z);
    }

    #[test]
    fn parses_naive_timestamp_as_utc() {
        let now = Utc::now();
        let naive = parse_published_at("2026-01-15T10:30:00.123", now);
        assert_eq!(naive.to_rfc3339(), "2026-01-15T10:30:00.123+00:00");
    }

    #[test]
    fn garbage_becomes_now() {
        let now = Utc::now();
        assert_eq!(parse_published_at("yesterday-ish", now), now);
    }

    #[test]
    fn future_timestamps_are_clamped() {
        let now = Utc::now();
        let future = (now + Duration::hours(6)).to_rfc3339();
        assert_eq!(parse_published_at(&future, now), now);

        // Within the skew tolerance is kept as-is.
        let near = now + Duration::minutes(2);
        assert_eq!(parse_published_at(&near.to_rfc3339(), now), near);
    }
}
