use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::error;

use newsradar_common::{ArticleMessage, Story};
use newsradar_engine::Analyzer;
use newsradar_ingest::{IngestOutcome, Ingestor};
use newsradar_store::{SourceRepo, StoreError};

pub struct AppState {
    pub ingestor: Arc<Ingestor>,
    pub analyzer: Arc<Analyzer>,
    pub sources: Arc<dyn SourceRepo>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest))
        .route("/analyse", post(analyse))
        .route("/sources", get(list_sources))
        .route("/sources/{id}", patch(update_source))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

// --- /ingest ---

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
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

#[derive(Debug, Serialize)]
struct IngestResponse {
    hot: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    hotness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    story: Option<Story>,
}

/// Validate an ingest payload; returns the offending field on failure.
pub fn validate_ingest(request: &IngestRequest) -> Result<(), &'static str> {
    if request.source_name.trim().is_empty() {
        return Err("source_name must not be empty");
    }
    if request.url.trim().is_empty() || request.url.len() > 1000 {
        return Err("url must be 1..=1000 characters");
    }
    let parsed = url::Url::parse(request.url.trim()).map_err(|_| "url is not a valid URL")?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err("url must use http or https");
    }
    if request.title.trim().is_empty() || request.title.len() > 500 {
        return Err("title must be 1..=500 characters");
    }
    if request.content.trim().is_empty() {
        return Err("content must not be empty");
    }
    Ok(())
}

async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> impl IntoResponse {
    if let Err(reason) = validate_ingest(&request) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": reason})),
        )
            .into_response();
    }

    let message = ArticleMessage {
        source_name: request.source_name,
        url: request.url,
        title: request.title,
        content: request.content,
        published_at: request.published_at,
        companies: request.companies,
        people: request.people,
    };

    let outcome = match state.ingestor.ingest(&message).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Ingest failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "ingest failed"})),
            )
                .into_response();
        }
    };

    let cluster_id = match outcome {
        IngestOutcome::Inserted { cluster_id, .. } => cluster_id,
        IngestOutcome::Duplicate { .. } | IngestOutcome::Rejected { .. } => {
            return Json(IngestResponse {
                hot: false,
                hotness: None,
                story: None,
            })
            .into_response();
        }
    };

    let scored = match state.analyzer.assess_cluster(cluster_id).await {
        Ok(Some(scored)) => scored,
        Ok(None) => {
            return Json(IngestResponse {
                hot: false,
                hotness: None,
                story: None,
            })
            .into_response();
        }
        Err(e) => {
            error!(error = %e, "Cluster assessment failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "assessment failed"})),
            )
                .into_response();
        }
    };

    // Story synthesis only for hot clusters on this path.
    if state.analyzer.is_hot(scored.score) {
        let story = state.analyzer.enrich_cluster(&scored).await;
        Json(IngestResponse {
            hot: true,
            hotness: Some(scored.score),
            story: Some(story),
        })
        .into_response()
    } else {
        Json(IngestResponse {
            hot: false,
            hotness: Some(scored.score),
            story: None,
        })
        .into_response()
    }
}

// --- /analyse ---

#[derive(Debug, Deserialize)]
pub struct AnalyseRequest {
    pub window_hours: u32,
    pub top_k: usize,
    #[serde(default = "default_concurrent")]
    pub concurrent: bool,
}

fn default_concurrent() -> bool {
    true
}

pub fn validate_analyse(window_hours: u32, top_k: usize) -> Result<(), &'static str> {
    if !(1..=168).contains(&window_hours) {
        return Err("window_hours must be in 1..=168");
    }
    if !(1..=50).contains(&top_k) {
        return Err("top_k must be in 1..=50");
    }
    Ok(())
}

async fn analyse(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyseRequest>,
) -> impl IntoResponse {
    if let Err(reason) = validate_analyse(request.window_hours, request.top_k) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": reason})),
        )
            .into_response();
    }

    match state
        .analyzer
        .analyse(request.window_hours, request.top_k, request.concurrent)
        .await
    {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            error!(error = %e, "Analysis failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "analysis failed"})),
            )
                .into_response()
        }
    }
}

// --- /sources ---

async fn list_sources(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.sources.list().await {
        Ok(sources) => Json(serde_json::json!({"sources": sources})).into_response(),
        Err(e) => {
            error!(error = %e, "Source listing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "source listing failed"})),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateSourceRequest {
    reputation: f64,
}

async fn update_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(request): Json<UpdateSourceRequest>,
) -> impl IntoResponse {
    if !(0.0..=1.0).contains(&request.reputation) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "reputation must be in [0,1]"})),
        )
            .into_response();
    }

    match state.sources.set_reputation(id, request.reputation).await {
        Ok(()) => Json(serde_json::json!({"status": "updated"})).into_response(),
        Err(StoreError::SourceNotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "source not found"})),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Reputation update failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "update failed"})),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyse_bounds() {
        assert!(validate_analyse(1, 1).is_ok());
        assert!(validate_analyse(168, 50).is_ok());
        assert!(validate_analyse(0, 10).is_err());
        assert!(validate_analyse(169, 10).is_err());
        assert!(validate_analyse(24, 0).is_err());
        assert!(validate_analyse(24, 51).is_err());
    }

    #[test]
    fn ingest_bounds() {
        let ok = IngestRequest {
            source_name: "Reuters".to_string(),
            url: "https://example.com/a".to_string(),
            title: "t".to_string(),
            content: "c".to_string(),
            published_at: "2026-01-01T00:00:00Z".to_string(),
            companies: vec![],
            people: vec![],
        };
        assert!(validate_ingest(&ok).is_ok());

        let empty_url = IngestRequest {
            url: "  ".to_string(),
            ..ok
        };
        assert!(validate_ingest(&empty_url).is_err());
    }
}
