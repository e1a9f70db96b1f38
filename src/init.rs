//! Shared initialization logic for the CLI and embedding hosts.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::config::{load_discovery_config, resolve_data_path, DiscoveryConfig};
use crate::db::{apply_schema, init_db, load_db_config, ShelfmarkDb};
use crate::embedding::{
    create_embedding_service, load_provider_config, BackfillService, EmbeddingProviderConfig,
    EmbeddingService, StalenessManager,
};
use crate::repository::{CatalogStore, SurrealCatalogStore};
use crate::services::{
    DiscoveryService, KeywordRetriever, RecommendationService, SimilarService, VectorRetriever,
};

/// Application context holding all services.
///
/// The embedder is built once here and handed to every component that needs it.
pub struct AppContext {
    pub db: Option<Arc<ShelfmarkDb>>,
    pub data_path: PathBuf,
    pub config: DiscoveryConfig,
    pub store: Arc<dyn CatalogStore>,
    pub embedding_service: Arc<dyn EmbeddingService + Send + Sync>,
    pub backfill: Arc<BackfillService>,
    pub staleness_manager: Arc<StalenessManager>,
    pub discovery: Arc<DiscoveryService>,
    pub recommendations: Arc<RecommendationService>,
    pub similar: Arc<SimilarService>,
}

impl AppContext {
    /// Initialize application context against the configured database.
    ///
    /// Data path priority: explicit path > SHELFMARK_DATA_PATH env > ./.shelfmark (if exists) > ~/.shelfmark
    ///
    /// `no_semantic` forces keyword-only search regardless of config.
    pub async fn new(explicit_path: Option<PathBuf>, no_semantic: bool) -> Result<Self> {
        let explicit_path = explicit_path
            .or_else(|| std::env::var("SHELFMARK_DATA_PATH").ok().map(PathBuf::from));
        let data_path = resolve_data_path(explicit_path);
        tracing::info!("Using data path: {}", data_path.display());
        std::fs::create_dir_all(&data_path)?;

        let mut config = load_discovery_config(&data_path)?;
        if no_semantic {
            config.search.semantic_enabled = false;
        }

        let db_config = load_db_config(&data_path);
        let db = init_db(&db_config, &data_path).await?;
        tracing::info!("Database connected");

        apply_schema(&db).await?;
        tracing::info!("Schema applied");
        let db = Arc::new(db);

        tracing::info!("Initializing embedding model...");
        let provider = load_provider_config(&data_path);
        let embedding_service = create_embedding_service(&provider).await?;
        log_embedder(&provider, embedding_service.as_ref());

        let store: Arc<dyn CatalogStore> = Arc::new(SurrealCatalogStore::new(db.clone()));
        let mut ctx = Self::from_parts(store, embedding_service, config, data_path);
        ctx.db = Some(db);
        Ok(ctx)
    }

    /// Wire services over an existing store and embedder.
    pub fn from_parts(
        store: Arc<dyn CatalogStore>,
        embedding_service: Arc<dyn EmbeddingService + Send + Sync>,
        config: DiscoveryConfig,
        data_path: PathBuf,
    ) -> Self {
        let backfill = Arc::new(BackfillService::new(
            store.clone(),
            embedding_service.clone(),
            config.backfill.batch_size,
            config.backfill.min_interval(),
        ));
        let staleness_manager = Arc::new(StalenessManager::new(store.clone(), backfill.clone()));

        let retriever = VectorRetriever::new(
            store.clone(),
            embedding_service.clone(),
            backfill.clone(),
            config.search.max_limit,
        );
        let keywords = KeywordRetriever::new(store.clone(), config.search.max_limit);
        let discovery = Arc::new(DiscoveryService::new(
            retriever,
            keywords,
            config.search.clone(),
        ));
        let recommendations = Arc::new(RecommendationService::new(
            store.clone(),
            config.recommend.clone(),
        ));
        let similar = Arc::new(SimilarService::new(store.clone()));

        Self {
            db: None,
            data_path,
            config,
            store,
            embedding_service,
            backfill,
            staleness_manager,
            discovery,
            recommendations,
            similar,
        }
    }
}

fn log_embedder(
    provider: &EmbeddingProviderConfig,
    service: &(dyn EmbeddingService + Send + Sync),
) {
    if service.is_available() {
        tracing::info!(
            provider = provider.provider_name(),
            "Embedding model loaded ({} dimensions)",
            service.dimensions()
        );
    } else {
        tracing::warn!(
            provider = provider.provider_name(),
            "Embedding model not available; search will use keyword fallback"
        );
    }
}
