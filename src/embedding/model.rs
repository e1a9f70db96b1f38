//! Local embedding model implementation using candle.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::embedding::candle_backend::{select_device, BertEmbedder, ModelFiles};
use crate::embedding::EmbeddingService;
use crate::ShelfmarkError;

/// Default sentence-embedding checkpoint.
pub const DEFAULT_MODEL_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Output width of all-MiniLM-L6-v2.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Configuration for embedding model initialization.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// HuggingFace repository id of the model
    pub model_repo: String,
    /// Expected vector width
    pub dimensions: usize,
    /// Optional cache directory for model files
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_repo: DEFAULT_MODEL_REPO.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            cache_dir: None,
        }
    }
}

/// Local embedding service backed by a candle BERT encoder.
///
/// Inference is CPU/GPU bound and runs under `spawn_blocking`.
pub struct LocalEmbeddingService {
    model: Option<Arc<BertEmbedder>>,
    model_repo: String,
    dimensions: usize,
    load_error: Option<String>,
}

impl LocalEmbeddingService {
    /// Create a new local embedding service.
    ///
    /// Attempts to download and load the model. If loading fails (e.g., no
    /// internet on first run), the service is constructed but unavailable, and
    /// every embed call returns `ModelUnavailable`.
    pub async fn new(config: EmbeddingConfig) -> Result<Self, ShelfmarkError> {
        let repo = config.model_repo.clone();
        let cache_dir = config.cache_dir.clone();

        let loaded = tokio::task::spawn_blocking(move || {
            let files = ModelFiles::fetch(&repo, cache_dir.as_deref())?;
            BertEmbedder::new(&files, select_device())
        })
        .await
        .map_err(|e| ShelfmarkError::ModelUnavailable(format!("Task join error: {}", e)))?;

        match loaded {
            Ok(embedder) => {
                info!(model = %config.model_repo, "Embedding model loaded");
                Ok(Self {
                    model: Some(Arc::new(embedder)),
                    model_repo: config.model_repo,
                    dimensions: config.dimensions,
                    load_error: None,
                })
            }
            Err(e) => {
                warn!(
                    "Failed to load embedding model {}: {:#}. Semantic search will be unavailable.",
                    config.model_repo, e
                );
                Ok(Self {
                    model: None,
                    model_repo: config.model_repo,
                    dimensions: config.dimensions,
                    load_error: Some(format!("{:#}", e)),
                })
            }
        }
    }

    fn loaded_model(&self) -> Result<Arc<BertEmbedder>, ShelfmarkError> {
        self.model.clone().ok_or_else(|| {
            ShelfmarkError::ModelUnavailable(
                self.load_error
                    .clone()
                    .unwrap_or_else(|| format!("{} not loaded", self.model_repo)),
            )
        })
    }
}

#[async_trait]
impl EmbeddingService for LocalEmbeddingService {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ShelfmarkError> {
        let mut batch = self.embed_batch(&[text.to_string()]).await?;
        batch
            .pop()
            .ok_or_else(|| ShelfmarkError::Embedding("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ShelfmarkError> {
        let model = self.loaded_model()?;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || model.embed(&texts))
            .await
            .map_err(|e| ShelfmarkError::Embedding(format!("Task join error: {}", e)))?
            .map_err(|e| ShelfmarkError::Embedding(format!("{:#}", e)))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn is_available(&self) -> bool {
        self.model.is_some()
    }
}
