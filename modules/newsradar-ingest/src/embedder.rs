use anyhow::Result;
use llm_client::{EmbedAgent, OpenAi};
use newsradar_common::RadarError;

// --- TextEmbedder trait ---

#[async_trait::async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Unit-normalised embedding of `text`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RadarError>;

    fn dimensions(&self) -> usize;
}

/// Embedder backed by an OpenAI-compatible embeddings endpoint.
pub struct HttpEmbedder {
    agent: OpenAi,
    dimensions: usize,
}

impl HttpEmbedder {
    pub fn new(agent: OpenAi, dimensions: usize) -> Self {
        Self { agent, dimensions }
    }
}

#[async_trait::async_trait]
impl TextEmbedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RadarError> {
        let vector = self
            .agent
            .embed(text)
            .await
            .map_err(|e| RadarError::Embedding(e.to_string()))?;

        if vector.len() != self.dimensions {
            return Err(RadarError::Embedding(format!(
                "endpoint returned {} dimensions, expected {}",
                vector.len(),
                self.dimensions
            )));
        }

        Ok(normalize(vector)?)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Scale a vector to unit length. Cosine similarity then reduces to a dot
/// product inside the index.
pub fn normalize(mut vector: Vec<f32>) -> Result<Vec<f32>, RadarError> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm == 0.0 {
        return Err(RadarError::Embedding("degenerate embedding (zero norm)".to_string()));
    }
    for x in &mut vector {
        *x /= norm;
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_vector() {
        let v = normalize(vec![3.0, 4.0]).unwrap();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_is_rejected() {
        assert!(normalize(vec![0.0, 0.0]).is_err());
    }
}
