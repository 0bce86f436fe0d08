//! Article ingestion: relevance gating, embedding, cluster assignment,
//! persistence, and the queue worker that drives it all.

pub mod classifier;
pub mod embedder;
pub mod ingestor;
pub mod reconcile;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use classifier::{Admission, LlmRelevanceModel, Prediction, RelevanceClassifier, RelevanceModel};
pub use embedder::{HttpEmbedder, TextEmbedder};
pub use ingestor::{IngestOutcome, Ingestor};
pub use reconcile::reconcile;
pub use worker::Worker;
