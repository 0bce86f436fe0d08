//! Deterministic fakes for pipeline tests: no network, no broker, no
//! database.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

use newsradar_common::{ArticleMessage, RadarError};

use crate::classifier::{Prediction, RelevanceModel};
use crate::embedder::{normalize, TextEmbedder};

// ---------------------------------------------------------------------------
// MockEmbedder
// ---------------------------------------------------------------------------

/// Embedder with registered vectors per text and a deterministic hash-based
/// fallback. Registered vectors let tests pin exact cosine similarities.
pub struct MockEmbedder {
    dimensions: usize,
    registered: Mutex<HashMap<String, Vec<f32>>>,
    fail: bool,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            registered: Mutex::new(HashMap::new()),
            fail: false,
        }
    }

    /// An embedder whose every call fails, for nack-path tests.
    pub fn failing(dimensions: usize) -> Self {
        Self {
            dimensions,
            registered: Mutex::new(HashMap::new()),
            fail: true,
        }
    }

    /// Pin the vector returned for `text`. Normalised on registration.
    pub fn register(&self, text: impl Into<String>, vector: Vec<f32>) {
        let vector = normalize(vector).expect("registered vector must be non-zero");
        assert_eq!(vector.len(), self.dimensions);
        self.registered.lock().unwrap().insert(text.into(), vector);
    }

    fn fallback(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for (i, slot) in vector.iter_mut().enumerate() {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            *slot = ((hasher.finish() % 2000) as f32 / 1000.0) - 1.0;
        }
        normalize(vector).expect("hash fallback is non-zero")
    }
}

#[async_trait::async_trait]
impl TextEmbedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RadarError> {
        if self.fail {
            return Err(RadarError::Embedding("mock embedder down".to_string()));
        }
        if let Some(vector) = self.registered.lock().unwrap().get(text) {
            return Ok(vector.clone());
        }
        Ok(self.fallback(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// StaticModel
// ---------------------------------------------------------------------------

/// Relevance model returning one fixed prediction, or always erroring.
pub struct StaticModel {
    prediction: Option<Prediction>,
}

impl StaticModel {
    pub fn new(category: &str, confidence: f32) -> Self {
        Self {
            prediction: Some(Prediction {
                category: category.to_string(),
                confidence,
            }),
        }
    }

    pub fn failing() -> Self {
        Self { prediction: None }
    }
}

#[async_trait::async_trait]
impl RelevanceModel for StaticModel {
    async fn predict(&self, _text: &str) -> Result<Prediction> {
        match &self.prediction {
            Some(p) => Ok(Prediction {
                category: p.category.clone(),
                confidence: p.confidence,
            }),
            None => Err(anyhow!("model unavailable")),
        }
    }
}

// ---------------------------------------------------------------------------
// Message helpers
// ---------------------------------------------------------------------------

pub fn message(url: &str, title: &str, content: &str, published_at: DateTime<Utc>) -> ArticleMessage {
    ArticleMessage {
        source_name: "Reuters".to_string(),
        url: url.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        published_at: published_at.to_rfc3339(),
        companies: vec![],
        people: vec![],
    }
}
