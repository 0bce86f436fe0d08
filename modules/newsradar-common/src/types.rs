use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Articles ---

/// A persisted news article. `cluster_id` is assigned during ingestion and
/// never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub source_id: i32,
    pub url: String,
    pub title: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub cluster_id: Option<Uuid>,
    pub companies: Vec<String>,
    pub people: Vec<String>,
}

impl Article {
    /// The text the embedding is derived from.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }
}

/// The wire payload carried per article on the work queue, and accepted by
/// the single-article ingest endpoint. `published_at` stays a string here;
/// the ingest pipeline owns the (lenient) timestamp parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleMessage {
    pub source_name: String,
    pub url: String,
    pub title: String,
    pub content: String,
    pub published_at: String,
    #[serde(default)]
    pub companies: Vec<String>,
    #[serde(default)]
    pub people: Vec<String>,
}

// --- Sources ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i32,
    pub name: String,
    pub url: String,
    pub reputation: f64,
    pub created_at: DateTime<Utc>,
}

// --- Classification ---

/// Categories the learned relevance model can assign. Roughly the label set
/// of a general news classifier; the financial subset gates ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NewsCategory {
    Economy,
    Stock,
    Finance,
    Business,
    Technology,
    Politics,
    Society,
    Science,
    Sports,
    Entertainment,
    Incident,
    Other,
}

impl NewsCategory {
    /// Whether the category counts as financially relevant.
    pub fn is_financial(self) -> bool {
        matches!(
            self,
            NewsCategory::Economy
                | NewsCategory::Stock
                | NewsCategory::Finance
                | NewsCategory::Business
                | NewsCategory::Technology
        )
    }
}

impl std::fmt::Display for NewsCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NewsCategory::Economy => "economy",
            NewsCategory::Stock => "stock",
            NewsCategory::Finance => "finance",
            NewsCategory::Business => "business",
            NewsCategory::Technology => "technology",
            NewsCategory::Politics => "politics",
            NewsCategory::Society => "society",
            NewsCategory::Science => "science",
            NewsCategory::Sports => "sports",
            NewsCategory::Entertainment => "entertainment",
            NewsCategory::Incident => "incident",
            NewsCategory::Other => "other",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for NewsCategory {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "economy" => Ok(Self::Economy),
            "stock" => Ok(Self::Stock),
            "finance" => Ok(Self::Finance),
            "business" => Ok(Self::Business),
            "technology" => Ok(Self::Technology),
            "politics" => Ok(Self::Politics),
            "society" => Ok(Self::Society),
            "science" => Ok(Self::Science),
            "sports" => Ok(Self::Sports),
            "entertainment" => Ok(Self::Entertainment),
            "incident" => Ok(Self::Incident),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown NewsCategory: {other}")),
        }
    }
}

// --- Scoring ---

/// The five heuristic sub-scores and their weighted total, each in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HotnessBreakdown {
    pub materiality: f64,
    pub velocity: f64,
    pub breadth: f64,
    pub credibility: f64,
    pub unexpectedness: f64,
    pub total: f64,
}

impl HotnessBreakdown {
    pub fn zero() -> Self {
        Self {
            materiality: 0.0,
            velocity: 0.0,
            breadth: 0.0,
            credibility: 0.0,
            unexpectedness: 0.0,
            total: 0.0,
        }
    }
}

// --- Stories ---

/// A reference back to one of the articles a story is grounded in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub url: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// One entry of a story's reconstructed timeline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TimelineEvent {
    /// "YYYY-MM-DD HH:MM" as produced by the enrichment model.
    pub time: String,
    pub event: String,
}

/// The enrichment artefact for one hot cluster. Produced per request and
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub cluster_id: Uuid,
    pub hotness: HotnessBreakdown,
    pub learned: f64,
    /// Blended final score used for ranking and the hot gate.
    pub score: f64,
    pub headline: String,
    pub why_now: String,
    pub entities: Vec<String>,
    pub sources: Vec<SourceRef>,
    pub timeline: Vec<TimelineEvent>,
    pub draft: String,
    /// Publication-ready short variant (telegram-style).
    pub short_post: String,
    /// False when the LLM failed and fallback content was substituted.
    pub enriched: bool,
}

/// Result of an analysis run over a time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub results: Vec<Story>,
    pub total_clusters: usize,
    pub total_articles_analyzed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_roundtrip() {
        for c in [
            NewsCategory::Economy,
            NewsCategory::Stock,
            NewsCategory::Finance,
            NewsCategory::Business,
            NewsCategory::Technology,
            NewsCategory::Politics,
            NewsCategory::Society,
            NewsCategory::Science,
            NewsCategory::Sports,
            NewsCategory::Entertainment,
            NewsCategory::Incident,
            NewsCategory::Other,
        ] {
            let parsed: NewsCategory = c.to_string().parse().unwrap();
            assert_eq!(parsed, c);
        }
    }

    #[test]
    fn financial_categories() {
        assert!(NewsCategory::Economy.is_financial());
        assert!(NewsCategory::Stock.is_financial());
        assert!(!NewsCategory::Sports.is_financial());
        assert!(!NewsCategory::Other.is_financial());
    }

    #[test]
    fn message_defaults_optional_entities() {
        let msg: ArticleMessage = serde_json::from_str(
            r#"{"source_name":"Reuters","url":"https://example.com/a",
                "title":"t","content":"c","published_at":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(msg.companies.is_empty());
        assert!(msg.people.is_empty());
    }
}
