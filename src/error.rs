use thiserror::Error;

/// Custom error type for Shelfmark operations.
#[derive(Debug, Error)]
pub enum ShelfmarkError {
    /// The embedding model cannot run (missing weights, failed load).
    ///
    /// Never retried internally; callers fall back to keyword search.
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// The model ran but its output is unusable (wrong count or dimension).
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Writing vectors into the embedding cache failed.
    #[error("Embedding cache write failed: {0}")]
    CacheWrite(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Input validation failed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested entity was not found.
    #[error("Not found: {entity_type} with id '{id}'")]
    NotFound { entity_type: String, id: String },

    /// Configuration could not be read or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShelfmarkError {
    /// True when the failure comes from the embedder rather than the store.
    pub fn is_model_failure(&self) -> bool {
        matches!(
            self,
            ShelfmarkError::ModelUnavailable(_) | ShelfmarkError::Embedding(_)
        )
    }
}

impl From<surrealdb::Error> for ShelfmarkError {
    fn from(err: surrealdb::Error) -> Self {
        ShelfmarkError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for ShelfmarkError {
    fn from(err: serde_json::Error) -> Self {
        ShelfmarkError::Database(format!("JSON serialization error: {}", err))
    }
}

impl From<std::io::Error> for ShelfmarkError {
    fn from(err: std::io::Error) -> Self {
        ShelfmarkError::Database(format!("I/O error: {}", err))
    }
}

impl From<toml::de::Error> for ShelfmarkError {
    fn from(err: toml::de::Error) -> Self {
        ShelfmarkError::Config(err.to_string())
    }
}
