//! Embedding provider configuration and factory.
//!
//! Supports multiple embedding backends via a tagged enum configuration.
//! Default is the local candle model (all-MiniLM-L6-v2).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::read_toml_file;
use crate::embedding::model::{DEFAULT_DIMENSIONS, DEFAULT_MODEL_REPO};
use crate::embedding::{
    EmbeddingConfig, EmbeddingService, HashEmbeddingService, LocalEmbeddingService,
    NoopEmbeddingService,
};
use crate::ShelfmarkError;

/// Embedding provider configuration.
///
/// Determines which embedding backend to use. Loaded from
/// `{data_path}/embedding.toml` or `SHELFMARK_EMBEDDING_PROVIDER` env var.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum EmbeddingProviderConfig {
    /// Local candle model (default).
    Local {
        /// HuggingFace repository id
        #[serde(default = "default_local_model")]
        model: String,
        #[serde(default = "default_dimensions")]
        dimensions: usize,
        /// Cache directory for model files
        #[serde(default)]
        cache_dir: Option<String>,
    },
    /// FNV-1a feature hashing. Offline and deterministic.
    Hash {
        #[serde(default = "default_dimensions")]
        dimensions: usize,
    },
    /// No embedder; search always falls back to keywords.
    Noop,
}

fn default_local_model() -> String {
    DEFAULT_MODEL_REPO.to_string()
}

fn default_dimensions() -> usize {
    DEFAULT_DIMENSIONS
}

impl Default for EmbeddingProviderConfig {
    fn default() -> Self {
        Self::Local {
            model: default_local_model(),
            dimensions: default_dimensions(),
            cache_dir: None,
        }
    }
}

impl EmbeddingProviderConfig {
    /// Short provider name for status output.
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Hash { .. } => "hash",
            Self::Noop => "noop",
        }
    }
}

/// `{data_path}/embedding.toml`, then `SHELFMARK_EMBEDDING_PROVIDER` (JSON),
/// then the local MiniLM model. Broken sources are logged and skipped.
pub fn load_provider_config(data_path: &Path) -> EmbeddingProviderConfig {
    match read_toml_file::<EmbeddingProviderConfig>(&data_path.join("embedding.toml")) {
        Ok(Some(config)) => return config,
        Ok(None) => {}
        Err(e) => warn!("Ignoring embedding config: {}", e),
    }

    if let Ok(json) = std::env::var("SHELFMARK_EMBEDDING_PROVIDER") {
        match serde_json::from_str(&json) {
            Ok(config) => {
                info!("Using embedding provider from SHELFMARK_EMBEDDING_PROVIDER");
                return config;
            }
            Err(e) => warn!("Ignoring SHELFMARK_EMBEDDING_PROVIDER: {}", e),
        }
    }

    EmbeddingProviderConfig::default()
}

fn require_dimensions(dimensions: usize) -> Result<(), ShelfmarkError> {
    if dimensions == 0 {
        return Err(ShelfmarkError::Config(
            "embedding dimensions must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Create an embedding service from provider configuration.
///
/// A local model that fails to load still yields a service; it reports
/// unavailable and callers degrade to keyword search.
pub async fn create_embedding_service(
    config: &EmbeddingProviderConfig,
) -> Result<Arc<dyn EmbeddingService + Send + Sync>, ShelfmarkError> {
    match config {
        EmbeddingProviderConfig::Local {
            model,
            dimensions,
            cache_dir,
        } => {
            require_dimensions(*dimensions)?;
            let service = LocalEmbeddingService::new(EmbeddingConfig {
                model_repo: model.clone(),
                dimensions: *dimensions,
                cache_dir: cache_dir.as_ref().map(PathBuf::from),
            })
            .await?;
            Ok(Arc::new(service))
        }
        EmbeddingProviderConfig::Hash { dimensions } => {
            require_dimensions(*dimensions)?;
            Ok(Arc::new(HashEmbeddingService::new(*dimensions)))
        }
        EmbeddingProviderConfig::Noop => Ok(Arc::new(NoopEmbeddingService::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_local_minilm() {
        let config = EmbeddingProviderConfig::default();
        assert_eq!(config.provider_name(), "local");
        match config {
            EmbeddingProviderConfig::Local {
                model, dimensions, ..
            } => {
                assert_eq!(model, "sentence-transformers/all-MiniLM-L6-v2");
                assert_eq!(dimensions, 384);
            }
            other => panic!("unexpected default: {other:?}"),
        }
    }

    #[test]
    fn test_parse_hash_provider_from_toml() {
        let config: EmbeddingProviderConfig =
            toml::from_str("provider = \"hash\"\ndimensions = 64\n").unwrap();
        assert_eq!(config, EmbeddingProviderConfig::Hash { dimensions: 64 });
    }

    #[test]
    fn test_provider_loaded_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("embedding.toml"), "provider = \"noop\"\n").unwrap();
        assert_eq!(
            load_provider_config(dir.path()),
            EmbeddingProviderConfig::Noop
        );
    }

    #[tokio::test]
    async fn test_zero_dimensions_rejected() {
        let config = EmbeddingProviderConfig::Hash { dimensions: 0 };
        let result = create_embedding_service(&config).await;
        assert!(matches!(result, Err(ShelfmarkError::Config(_))));
    }
}
