//! Handler-level tests over the full router with in-memory fakes.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use newsradar_engine::testing::StaticChat;
use newsradar_engine::{AnalyzeOptions, Analyzer, Enricher, HotnessScorer, NoopScorer};
use newsradar_index::{ClusterIndex, SharedIndex};
use newsradar_ingest::testing::{MockEmbedder, StaticModel};
use newsradar_ingest::{Ingestor, RelevanceClassifier};
use newsradar_server::http::{router, AppState};
use newsradar_store::memory::MemoryStore;
use newsradar_store::SourceRepo;

const DIMS: usize = 4;

struct Harness {
    app: axum::Router,
    store: Arc<MemoryStore>,
    embedder: Arc<MockEmbedder>,
    _dir: tempfile::TempDir,
}

fn harness(hot_threshold: f64) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let index = SharedIndex::new(ClusterIndex::new(DIMS).unwrap(), dir.path(), 100);
    let embedder = Arc::new(MockEmbedder::new(DIMS));

    let ingestor = Arc::new(Ingestor::new(
        store.clone(),
        store.clone(),
        index,
        embedder.clone(),
        RelevanceClassifier::new(Arc::new(StaticModel::new("economy", 0.9)), 0.5),
        0.85,
    ));

    let analyzer = Arc::new(Analyzer::new(
        store.clone(),
        store.clone(),
        HotnessScorer::new(),
        Arc::new(NoopScorer),
        Enricher::new(Arc::new(StaticChat::failing()), Duration::from_secs(5)),
        AnalyzeOptions {
            hot_threshold,
            ..Default::default()
        },
    ));

    let state = Arc::new(AppState {
        ingestor,
        analyzer,
        sources: store.clone(),
    });

    Harness {
        app: router(state),
        store,
        embedder,
        _dir: dir,
    }
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn ingest_body(url: &str) -> Value {
    json!({
        "source_name": "Reuters",
        "url": url,
        "title": "Bank announces surprise merger",
        "content": "The merger creates the largest bank in the market by assets.",
        "published_at": Utc::now().to_rfc3339(),
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let h = harness(0.7);
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn ingest_rejects_invalid_payloads() {
    let h = harness(0.7);

    let mut missing_url = ingest_body("https://example.com/a");
    missing_url["url"] = json!("   ");
    let (status, _) = send(&h.app, "POST", "/ingest", missing_url).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&h.app, "POST", "/ingest", ingest_body("ftp://example.com/a")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut empty_content = ingest_body("https://example.com/a");
    empty_content["content"] = json!("");
    let (status, _) = send(&h.app, "POST", "/ingest", empty_content).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn single_cold_article_is_not_hot() {
    let h = harness(0.7);

    let (status, body) = send(&h.app, "POST", "/ingest", ingest_body("https://example.com/a")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hot"], json!(false));
    // Scored, but no story below the threshold.
    assert!(body["hotness"].is_number());
    assert!(body.get("story").is_none());
    assert_eq!(h.store.article_count(), 1);
}

#[tokio::test]
async fn hot_article_gets_a_story() {
    let h = harness(0.1);

    let (status, body) = send(&h.app, "POST", "/ingest", ingest_body("https://example.com/a")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hot"], json!(true));
    // The model is down, so the story is the fallback shape.
    assert_eq!(body["story"]["why_now"], json!("Analysis unavailable"));
    assert_eq!(
        body["story"]["headline"],
        json!("Bank announces surprise merger")
    );
}

#[tokio::test]
async fn duplicate_ingest_reports_not_hot() {
    let h = harness(0.1);

    let (_, first) = send(&h.app, "POST", "/ingest", ingest_body("https://example.com/a")).await;
    assert_eq!(first["hot"], json!(true));

    let (status, second) = send(&h.app, "POST", "/ingest", ingest_body("https://example.com/a")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["hot"], json!(false));
    assert_eq!(h.store.article_count(), 1);
}

#[tokio::test]
async fn analyse_validates_parameters() {
    let h = harness(0.7);

    for body in [
        json!({"window_hours": 0, "top_k": 5}),
        json!({"window_hours": 169, "top_k": 5}),
        json!({"window_hours": 24, "top_k": 0}),
        json!({"window_hours": 24, "top_k": 51}),
    ] {
        let (status, _) = send(&h.app, "POST", "/analyse", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn analyse_returns_ranked_fallback_stories() {
    let h = harness(0.7);

    // Orthogonal embeddings keep the three articles in three clusters.
    let content = "The merger creates the largest bank in the market by assets.";
    for i in 0..3 {
        let title = format!("Bank announces surprise merger {i}");
        let mut vector = vec![0.0; DIMS];
        vector[i] = 1.0;
        h.embedder.register(format!("{title} {content}"), vector);

        let mut body = ingest_body(&format!("https://example.com/{i}"));
        body["title"] = json!(title);
        let (status, _) = send(&h.app, "POST", "/ingest", body).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(
        &h.app,
        "POST",
        "/analyse",
        json!({"window_hours": 24, "top_k": 2}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(body["total_clusters"], json!(3));
    assert_eq!(body["total_articles_analyzed"], json!(3));
    for story in results {
        assert_eq!(story["why_now"], json!("Analysis unavailable"));
    }
}

#[tokio::test]
async fn source_reputation_is_administratively_mutable() {
    let h = harness(0.7);
    let id = h
        .store
        .get_or_create("Reuters", "https://reuters.com")
        .await
        .unwrap();

    let (status, body) = send(&h.app, "GET", "/sources", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sources"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &h.app,
        "PATCH",
        &format!("/sources/{id}"),
        json!({"reputation": 1.5}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &h.app,
        "PATCH",
        &format!("/sources/{id}"),
        json!({"reputation": 0.9}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let source = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(source.reputation, 0.9);

    let (status, _) = send(&h.app, "PATCH", "/sources/9999", json!({"reputation": 0.4})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
