/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An article with this URL already exists. Treated as successful
    /// duplicate handling by callers, never surfaced to users.
    #[error("Article URL already stored: {0}")]
    DuplicateUrl(String),

    #[error("Source not found: {0}")]
    SourceNotFound(i32),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
