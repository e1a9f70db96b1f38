//! Catalog embeddings: the embedder seam, its backends, and the cache
//! lifecycle (backfill, staleness, purge).
//!
//! `LocalEmbeddingService` runs all-MiniLM-L6-v2 on candle;
//! `HashEmbeddingService` works offline; `NoopEmbeddingService` disables
//! semantic search entirely.

pub mod backfill;
pub mod candle_backend;
pub mod composite;
pub mod hash_embedder;
pub mod model;
pub mod provider;
pub mod staleness;

use async_trait::async_trait;

use crate::ShelfmarkError;

pub use backfill::{BackfillService, BackfillStats};
pub use hash_embedder::HashEmbeddingService;
pub use model::{EmbeddingConfig, LocalEmbeddingService};
pub use provider::{create_embedding_service, load_provider_config, EmbeddingProviderConfig};
pub use staleness::StalenessManager;

/// Text to vector.
///
/// Vectors are unit length and exactly `dimensions()` wide. `embed_batch`
/// returns one vector per input, in input order. Model failures surface as
/// `ModelUnavailable` or `Embedding` and are never retried here.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ShelfmarkError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ShelfmarkError>;

    fn dimensions(&self) -> usize;

    /// False when the backend could not be loaded; searches then go
    /// straight to keyword matching.
    fn is_available(&self) -> bool;
}

/// Embedder stand-in that is never available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEmbeddingService;

impl NoopEmbeddingService {
    pub fn new() -> Self {
        Self
    }

    fn unavailable() -> ShelfmarkError {
        ShelfmarkError::ModelUnavailable("semantic search disabled (noop provider)".to_string())
    }
}

#[async_trait]
impl EmbeddingService for NoopEmbeddingService {
    async fn embed_text(&self, _text: &str) -> Result<Vec<f32>, ShelfmarkError> {
        Err(Self::unavailable())
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ShelfmarkError> {
        Err(Self::unavailable())
    }

    fn dimensions(&self) -> usize {
        model::DEFAULT_DIMENSIONS
    }

    fn is_available(&self) -> bool {
        false
    }
}
