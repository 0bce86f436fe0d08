use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use newsradar_common::Article;

/// Per-article score from an offline-trained regressor, in [0,1]. A model
/// that emits 0–100 must divide by 100 at its adapter boundary.
#[async_trait]
pub trait LearnedScorer: Send + Sync {
    async fn score_articles(&self, articles: &[Article]) -> Vec<f64>;
}

/// Regressor absent: every article scores 0 and the blend reduces to the
/// heuristic.
pub struct NoopScorer;

#[async_trait]
impl LearnedScorer for NoopScorer {
    async fn score_articles(&self, articles: &[Article]) -> Vec<f64> {
        vec![0.0; articles.len()]
    }
}

/// Feature-based stand-in used when no trained model is deployed: title
/// length, body length and hot-keyword presence.
pub struct HeuristicScorer;

const HOT_KEYWORDS: &[&str] = &[
    "crisis", "surge", "record", "urgent", "collapse", "plunge",
    "важн", "срочн", "кризис", "рост", "паден", "рекорд",
];

#[async_trait]
impl LearnedScorer for HeuristicScorer {
    async fn score_articles(&self, articles: &[Article]) -> Vec<f64> {
        articles
            .iter()
            .map(|article| {
                let title_score = (article.title.chars().count() as f64 / 100.0).min(1.0);
                let content_score = (article.content.chars().count() as f64 / 1000.0).min(1.0);

                let text = format!("{} {}", article.title, article.content).to_lowercase();
                let keyword_score: f64 = HOT_KEYWORDS
                    .iter()
                    .filter(|k| text.contains(*k))
                    .count() as f64
                    * 0.2;

                ((title_score + content_score + keyword_score) / 2.0).min(1.0)
            })
            .collect()
    }
}

/// Adapter for an externally hosted regressor. The inference service
/// receives headline/text/date features and replies with raw scores in
/// 0–100; normalisation to [0,1] happens here, at the boundary.
///
/// Any failure degrades to "regressor absent": zeros, logged, never fatal.
pub struct RemoteScorer {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    articles: Vec<ScoreFeatures<'a>>,
}

#[derive(Serialize)]
struct ScoreFeatures<'a> {
    headline: &'a str,
    text: &'a str,
    date: String,
    companies: &'a [String],
    people: &'a [String],
}

#[derive(Deserialize)]
struct ScoreResponse {
    scores: Vec<f64>,
}

impl RemoteScorer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    async fn request(&self, articles: &[Article]) -> anyhow::Result<Vec<f64>> {
        let request = ScoreRequest {
            articles: articles
                .iter()
                .map(|a| ScoreFeatures {
                    headline: &a.title,
                    text: &a.content,
                    date: a.published_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    companies: &a.companies,
                    people: &a.people,
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let parsed: ScoreResponse = response.json().await?;
        Ok(parsed.scores)
    }
}

/// Map raw 0–100 regressor outputs onto [0,1], defending against a model
/// that returns the wrong count.
fn normalize_scores(raw: Vec<f64>, expected: usize) -> Vec<f64> {
    let mut scores: Vec<f64> = raw
        .into_iter()
        .map(|s| (s / 100.0).clamp(0.0, 1.0))
        .collect();
    scores.resize(expected, 0.0);
    scores
}

#[async_trait]
impl LearnedScorer for RemoteScorer {
    async fn score_articles(&self, articles: &[Article]) -> Vec<f64> {
        if articles.is_empty() {
            return Vec::new();
        }
        match self.request(articles).await {
            Ok(raw) => normalize_scores(raw, articles.len()),
            Err(e) => {
                warn!(url = %self.url, error = %e, "Remote scorer failed; scoring zeros");
                vec![0.0; articles.len()]
            }
        }
    }
}

/// Cluster-level learned score: the mean over its articles, 0 when absent.
pub fn cluster_learned(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Final score: convex blend of heuristic and learned branches.
pub fn blend(heuristic: f64, learned: f64, learned_weight: f64) -> f64 {
    let w = learned_weight.clamp(0.0, 1.0);
    ((1.0 - w) * heuristic + w * learned).clamp(0.0, 1.0)
}
