use std::collections::{HashMap, HashSet};

use newsradar_common::{Article, HotnessBreakdown};

/// Keywords whose presence marks materially significant finance news.
const HIGH_IMPACT_KEYWORDS: &[&str] = &[
    "merger", "acquisition", "bankruptcy", "guidance", "regulation", "lawsuit",
    "fraud", "investigation", "earnings", "restructuring", "default", "dividend",
    "buyback", "ipo", "delisting", "sanctions",
    "слияние", "поглощение", "банкротство", "регулирование", "иск",
    "мошенничество", "расследование", "прибыль", "санкции", "дефолт",
];

/// A cluster's materiality saturates at this many keyword hits per article.
const MATERIALITY_SATURATION: f64 = 3.0;
/// Articles per hour at which velocity saturates.
const VELOCITY_SATURATION: f64 = 2.0;
/// Velocity assigned to a single-article cluster.
const SINGLE_ARTICLE_VELOCITY: f64 = 0.3;
/// Minimum publication span in hours, so bursts don't divide by zero.
const MIN_SPAN_HOURS: f64 = 0.1;
/// Distinct sources at which breadth saturates.
const BREADTH_SATURATION: f64 = 5.0;
/// Reputation assumed for sources missing from the registry snapshot.
const DEFAULT_REPUTATION: f64 = 0.5;
/// Body length (chars) at which unexpectedness saturates.
const UNEXPECTEDNESS_SATURATION: f64 = 2000.0;

/// Blend weights over the five sub-scores. Must sum to 1.
#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub materiality: f64,
    pub velocity: f64,
    pub breadth: f64,
    pub credibility: f64,
    pub unexpectedness: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            materiality: 0.25,
            velocity: 0.25,
            breadth: 0.20,
            credibility: 0.20,
            unexpectedness: 0.10,
        }
    }
}

/// Heuristic cluster hotness. A pure function of the articles and the
/// reputation snapshot: no clock, no randomness, so identical inputs always
/// produce identical scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct HotnessScorer {
    weights: Weights,
}

impl HotnessScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: Weights) -> Self {
        Self { weights }
    }

    pub fn score(
        &self,
        articles: &[Article],
        reputations: &HashMap<i32, f64>,
    ) -> HotnessBreakdown {
        if articles.is_empty() {
            return HotnessBreakdown::zero();
        }

        let materiality = materiality(articles);
        let velocity = velocity(articles);
        let breadth = breadth(articles);
        let credibility = credibility(articles, reputations);
        let unexpectedness = unexpectedness(articles);

        let w = &self.weights;
        let total = (w.materiality * materiality
            + w.velocity * velocity
            + w.breadth * breadth
            + w.credibility * credibility
            + w.unexpectedness * unexpectedness)
            .clamp(0.0, 1.0);

        HotnessBreakdown {
            materiality,
            velocity,
            breadth,
            credibility,
            unexpectedness,
            total,
        }
    }
}

fn materiality(articles: &[Article]) -> f64 {
    let per_article: f64 = articles
        .iter()
        .map(|article| {
            let text = format!("{} {}", article.title, article.content).to_lowercase();
            let hits = HIGH_IMPACT_KEYWORDS
                .iter()
                .filter(|keyword| text.contains(*keyword))
                .count() as f64;
            (hits / MATERIALITY_SATURATION).min(1.0)
        })
        .sum();
    (per_article / articles.len() as f64).min(1.0)
}

fn velocity(articles: &[Article]) -> f64 {
    if articles.len() <= 1 {
        return SINGLE_ARTICLE_VELOCITY;
    }

    let first = articles.iter().map(|a| a.published_at).min();
    let last = articles.iter().map(|a| a.published_at).max();
    let (Some(first), Some(last)) = (first, last) else {
        return SINGLE_ARTICLE_VELOCITY;
    };

    let span_hours = ((last - first).num_seconds() as f64 / 3600.0).max(MIN_SPAN_HOURS);
    let per_hour = articles.len() as f64 / span_hours;
    (per_hour / VELOCITY_SATURATION).min(1.0)
}

fn breadth(articles: &[Article]) -> f64 {
    let distinct: HashSet<i32> = articles.iter().map(|a| a.source_id).collect();
    (distinct.len() as f64 / BREADTH_SATURATION).min(1.0)
}

fn credibility(articles: &[Article], reputations: &HashMap<i32, f64>) -> f64 {
    let sum: f64 = articles
        .iter()
        .map(|a| reputations.get(&a.source_id).copied().unwrap_or(DEFAULT_REPUTATION))
        .sum();
    sum / articles.len() as f64
}

fn unexpectedness(articles: &[Article]) -> f64 {
    // Body length stands in for a novelty signal.
    let mean_len: f64 = articles
        .iter()
        .map(|a| a.content.chars().count() as f64)
        .sum::<f64>()
        / articles.len() as f64;
    (mean_len / UNEXPECTEDNESS_SATURATION).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn article(source_id: i32, minutes: i64, content: String) -> Article {
        Article {
            id: Uuid::new_v4(),
            source_id,
            url: format!("https://e.com/{source_id}/{minutes}"),
            title: "Companies announce merger".to_string(),
            content,
            published_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
                + Duration::minutes(minutes),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 13, 0, 0).unwrap(),
            cluster_id: Some(Uuid::nil()),
            companies: vec![],
            people: vec![],
        }
    }

    /// Three articles, three distinct sources with reputations
    /// {0.9, 0.85, 0.75}, published within 30 minutes, each mentioning
    /// "merger", bodies of ~1500 chars.
    fn scoring_vector() -> (Vec<Article>, HashMap<i32, f64>) {
        let body = "The merger filing follows weeks of speculation. ".repeat(31); // ~1488 chars
        let articles = vec![
            article(1, 0, body.clone()),
            article(2, 15, body.clone()),
            article(3, 30, body),
        ];
        let reputations = HashMap::from([(1, 0.9), (2, 0.85), (3, 0.75)]);
        (articles, reputations)
    }

    #[test]
    fn known_scoring_vector() {
        let (articles, reputations) = scoring_vector();
        let breakdown = HotnessScorer::new().score(&articles, &reputations);

        // One keyword hit per article ("merger"), capped at 3 hits.
        assert!((breakdown.materiality - 1.0 / 3.0).abs() < 0.02);
        // 3 articles over 0.5h = 6/h, saturated.
        assert!((breakdown.velocity - 1.0).abs() < 1e-9);
        // 3 of 5 sources.
        assert!((breakdown.breadth - 0.6).abs() < 1e-9);
        // mean(0.9, 0.85, 0.75).
        assert!((breakdown.credibility - 0.8333).abs() < 0.001);
        // ~1500 / 2000 chars.
        assert!((breakdown.unexpectedness - 0.75).abs() < 0.02);

        // Weighted total of the components above.
        let expected = 0.25 * (1.0 / 3.0) + 0.25 * 1.0 + 0.20 * 0.6 + 0.20 * 0.8333 + 0.10 * 0.75;
        assert!(
            (breakdown.total - expected).abs() < 0.02,
            "total {} vs expected {}",
            breakdown.total,
            expected
        );
    }

    #[test]
    fn scoring_is_deterministic() {
        let (articles, reputations) = scoring_vector();
        let scorer = HotnessScorer::new();
        let a = scorer.score(&articles, &reputations);
        let b = scorer.score(&articles, &reputations);
        assert_eq!(a, b);
    }

    #[test]
    fn all_scores_stay_in_unit_range() {
        let body = "merger acquisition bankruptcy fraud sanctions default ipo ".repeat(100);
        let articles: Vec<Article> = (0..20)
            .map(|i| article(i, i as i64, body.clone()))
            .collect();
        let breakdown = HotnessScorer::new().score(&articles, &HashMap::new());

        for value in [
            breakdown.materiality,
            breakdown.velocity,
            breakdown.breadth,
            breakdown.credibility,
            breakdown.unexpectedness,
            breakdown.total,
        ] {
            assert!((0.0..=1.0).contains(&value), "score out of range: {value}");
        }
    }

    #[test]
    fn single_article_gets_baseline_velocity() {
        let articles = vec![article(1, 0, "merger talk".to_string())];
        let breakdown = HotnessScorer::new().score(&articles, &HashMap::new());
        assert!((breakdown.velocity - 0.3).abs() < 1e-9);
        // Missing reputation defaults to 0.5.
        assert!((breakdown.credibility - 0.5).abs() < 1e-9);
    }

    #[test]
    fn empty_cluster_scores_zero() {
        let breakdown = HotnessScorer::new().score(&[], &HashMap::new());
        assert_eq!(breakdown.total, 0.0);
    }
}
