use thiserror::Error;

#[derive(Error, Debug)]
pub enum RadarError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
