//! Ranking and fallback behaviour of the analysis job.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use uuid::Uuid;

use newsradar_common::Article;
use newsradar_engine::testing::StaticChat;
use newsradar_engine::{
    blend, cluster_learned, AnalyzeOptions, Analyzer, Enricher, HotnessScorer, LearnedScorer,
    NoopScorer, FALLBACK_WHY_NOW,
};
use newsradar_store::memory::MemoryStore;
use newsradar_store::{ArticleRepo, SourceRepo};

fn article(cluster: Uuid, source_id: i32, title: &str, minutes_ago: i64, body: String) -> Article {
    Article {
        id: Uuid::new_v4(),
        source_id,
        url: format!("https://example.com/{}", Uuid::new_v4()),
        title: title.to_string(),
        content: body,
        published_at: Utc::now() - ChronoDuration::minutes(minutes_ago),
        created_at: Utc::now(),
        cluster_id: Some(cluster),
        companies: vec![],
        people: vec![],
    }
}

/// Seed one cluster: `articles` articles from that many distinct sources,
/// published over 30 minutes, oldest first titled `first_title`.
async fn seed_cluster(
    store: &MemoryStore,
    cluster: Uuid,
    articles: usize,
    source_base: i32,
    first_title: &str,
    keyword: bool,
    body_chars: usize,
) {
    let filler = if keyword { "merger " } else { "update " };
    let body = filler.repeat(body_chars / filler.len() + 1);
    for i in 0..articles {
        let minutes_ago = 40 - (i as i64 * 30 / articles.max(1) as i64);
        let title = if i == 0 {
            first_title.to_string()
        } else {
            format!("{first_title} (follow-up {i})")
        };
        store
            .insert(&article(
                cluster,
                source_base + i as i32,
                &title,
                minutes_ago,
                body.clone(),
            ))
            .await
            .unwrap();
    }
}

fn analyzer(store: Arc<MemoryStore>, chat: StaticChat) -> Analyzer {
    Analyzer::new(
        store.clone(),
        store,
        HotnessScorer::new(),
        Arc::new(NoopScorer),
        Enricher::new(Arc::new(chat), Duration::from_secs(5)),
        AnalyzeOptions::default(),
    )
}

/// Recompute each cluster's blended score independently, newest ranking
/// first, ties by cluster id.
async fn expected_ranking(store: &MemoryStore) -> Vec<(Uuid, f64)> {
    let reputations: HashMap<i32, f64> = store.reputations().await.unwrap();
    let scorer = HotnessScorer::new();

    let mut by_cluster: HashMap<Uuid, Vec<Article>> = HashMap::new();
    for a in store.recent(24).await.unwrap() {
        by_cluster.entry(a.cluster_id.unwrap()).or_default().push(a);
    }

    let mut expected = Vec::new();
    for (cluster, articles) in by_cluster {
        let hotness = scorer.score(&articles, &reputations);
        let learned = cluster_learned(&NoopScorer.score_articles(&articles).await);
        expected.push((cluster, blend(hotness.total, learned, 0.3)));
    }
    expected.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)));
    expected
}

async fn seed_seven_clusters(store: &MemoryStore) -> Vec<Uuid> {
    let clusters: Vec<Uuid> = (0..7).map(|_| Uuid::new_v4()).collect();
    for (i, cluster) in clusters.iter().enumerate() {
        seed_cluster(
            store,
            *cluster,
            i + 1,
            (100 * (i + 1)) as i32,
            &format!("Story number {i}"),
            i % 2 == 0,
            300 + i * 250,
        )
        .await;
    }
    clusters
}

#[tokio::test]
async fn s4_top_k_matches_independent_scoring() {
    let store = Arc::new(MemoryStore::new());
    seed_seven_clusters(&store).await;

    let analyzer = analyzer(store.clone(), StaticChat::failing());
    let report = analyzer.analyse(24, 5, false).await.unwrap();

    assert_eq!(report.results.len(), 5);
    assert_eq!(report.total_clusters, 7);

    let expected = expected_ranking(&store).await;
    let expected_ids: Vec<Uuid> = expected.iter().take(5).map(|(id, _)| *id).collect();
    let got_ids: Vec<Uuid> = report.results.iter().map(|s| s.cluster_id).collect();
    assert_eq!(got_ids, expected_ids);

    // Descending blended scores.
    assert!(report
        .results
        .windows(2)
        .all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn concurrent_and_sequential_agree() {
    let store = Arc::new(MemoryStore::new());
    seed_seven_clusters(&store).await;

    let analyzer = analyzer(store.clone(), StaticChat::failing());
    let sequential = analyzer.analyse(24, 5, false).await.unwrap();
    let concurrent = analyzer.analyse(24, 5, true).await.unwrap();

    let a: Vec<Uuid> = sequential.results.iter().map(|s| s.cluster_id).collect();
    let b: Vec<Uuid> = concurrent.results.iter().map(|s| s.cluster_id).collect();
    assert_eq!(a, b);
}

#[tokio::test]
async fn fewer_clusters_than_k_returns_all() {
    let store = Arc::new(MemoryStore::new());
    let clusters: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    for (i, cluster) in clusters.iter().enumerate() {
        seed_cluster(&store, *cluster, 2, (10 * (i + 1)) as i32, "Some story", true, 500).await;
    }

    let analyzer = analyzer(store, StaticChat::failing());
    let report = analyzer.analyse(24, 10, false).await.unwrap();
    assert_eq!(report.results.len(), 3);
}

#[tokio::test]
async fn equal_scores_rank_by_cluster_id() {
    let store = Arc::new(MemoryStore::new());
    let c1 = Uuid::new_v4();
    let c2 = Uuid::new_v4();
    // Identical compositions → identical scores.
    seed_cluster(&store, c1, 1, 10, "Twin story", true, 400).await;
    seed_cluster(&store, c2, 1, 20, "Twin story", true, 400).await;

    let analyzer = analyzer(store, StaticChat::failing());
    let report = analyzer.analyse(24, 2, false).await.unwrap();

    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].score, report.results[1].score);
    let (lo, hi) = (c1.min(c2), c1.max(c2));
    assert_eq!(report.results[0].cluster_id, lo);
    assert_eq!(report.results[1].cluster_id, hi);
}

#[tokio::test]
async fn s5_llm_failure_still_produces_complete_report() {
    let store = Arc::new(MemoryStore::new());
    let clusters = seed_seven_clusters(&store).await;

    let analyzer = analyzer(store, StaticChat::failing());
    let report = analyzer.analyse(24, 3, true).await.unwrap();

    assert_eq!(report.results.len(), 3);
    for story in &report.results {
        assert!(!story.enriched);
        assert_eq!(story.why_now, FALLBACK_WHY_NOW);
        assert!(story.headline.starts_with("Story number"));
        assert!(story.headline.chars().count() <= 100);
        assert!(story.draft.is_empty());
        assert!(!story.sources.is_empty());
        assert!(clusters.contains(&story.cluster_id));
    }
}

#[tokio::test]
async fn successful_enrichment_marks_stories() {
    let store = Arc::new(MemoryStore::new());
    seed_seven_clusters(&store).await;

    let analyzer = analyzer(
        store,
        StaticChat::with_json(json!({
            "headline": "A clean headline",
            "why_now": "It just happened.",
            "entities": ["ACME"],
            "timeline": [],
            "draft": "Lead.",
            "short_post": "⚡️A clean headline"
        })),
    );
    let report = analyzer.analyse(24, 2, false).await.unwrap();
    assert!(report.results.iter().all(|s| s.enriched));
    assert!(report.results.iter().all(|s| s.headline == "A clean headline"));
}

#[tokio::test]
async fn assess_cluster_scores_one_cluster() {
    let store = Arc::new(MemoryStore::new());
    let cluster = Uuid::new_v4();
    seed_cluster(&store, cluster, 3, 10, "Merger watch", true, 1500).await;

    let analyzer = analyzer(store, StaticChat::failing());
    let scored = analyzer.assess_cluster(cluster).await.unwrap().unwrap();
    assert_eq!(scored.cluster_id, cluster);
    assert_eq!(scored.articles.len(), 3);
    assert!(scored.score > 0.0 && scored.score <= 1.0);
    // Oldest article first for timeline reconstruction.
    assert!(scored
        .articles
        .windows(2)
        .all(|w| w[0].published_at <= w[1].published_at));

    assert!(analyzer
        .assess_cluster(Uuid::new_v4())
        .await
        .unwrap()
        .is_none());
}
