//! Test harness for database lifecycle management.
//!
//! Provides isolated database instances per test using tempfile, plus an
//! in-memory application context for service-level tests.

use std::sync::Arc;
use tempfile::TempDir;

use shelfmark::config::DiscoveryConfig;
use shelfmark::db::{apply_schema, init_db, DbConfig, ShelfmarkDb};
use shelfmark::embedding::{EmbeddingService, HashEmbeddingService, NoopEmbeddingService};
use shelfmark::init::AppContext;
use shelfmark::repository::{CatalogStore, InMemoryCatalogStore, SurrealCatalogStore};

/// Test harness that manages database lifecycle.
///
/// Each TestHarness creates an isolated RocksDB database in a temporary
/// directory. The database is removed when the harness is dropped.
pub struct TestHarness {
    /// Database connection wrapped in Arc for service sharing
    pub db: Arc<ShelfmarkDb>,
    /// Store over `db`
    pub store: Arc<SurrealCatalogStore>,
    /// Temporary directory (kept alive while harness exists)
    pub temp_dir: TempDir,
}

impl TestHarness {
    /// Create a new test harness with isolated database.
    ///
    /// Panics if database initialization fails (appropriate for tests).
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory for test database");

        let db_path = temp_dir.path().join("test.db");
        let config = DbConfig::Embedded {
            path: Some(db_path.to_string_lossy().into_owned()),
        };
        let db = init_db(&config, temp_dir.path())
            .await
            .expect("Failed to initialize test database");

        apply_schema(&db)
            .await
            .expect("Failed to apply schema to test database");

        let db = Arc::new(db);
        Self {
            store: Arc::new(SurrealCatalogStore::new(db.clone())),
            db,
            temp_dir,
        }
    }

    /// Application context wired over this harness's database.
    pub fn context(&self, embedder: Arc<dyn EmbeddingService + Send + Sync>) -> AppContext {
        let store: Arc<dyn CatalogStore> = self.store.clone();
        let mut ctx = AppContext::from_parts(
            store,
            embedder,
            DiscoveryConfig::default(),
            self.temp_dir.path().to_path_buf(),
        );
        ctx.db = Some(self.db.clone());
        ctx
    }
}

/// Application context over an in-memory store with default settings.
pub fn memory_context(
    store: Arc<InMemoryCatalogStore>,
    embedder: Arc<dyn EmbeddingService + Send + Sync>,
    config: DiscoveryConfig,
) -> AppContext {
    AppContext::from_parts(store, embedder, config, std::env::temp_dir())
}

/// Create a no-op embedding service for testing.
///
/// Reports as unavailable and fails every call, which forces keyword fallback.
pub fn test_embedding_service() -> Arc<dyn EmbeddingService + Send + Sync> {
    Arc::new(NoopEmbeddingService::new())
}

/// Deterministic offline embedder with the default dimension count.
pub fn hash_embedding_service() -> Arc<dyn EmbeddingService + Send + Sync> {
    Arc::new(HashEmbeddingService::default())
}
