//! Integration tests for composed search: semantic retrieval over the
//! embedding cache with keyword fallback.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use common::{hash_embedding_service, memory_context, test_embedding_service, BookBuilder};
use shelfmark::config::DiscoveryConfig;
use shelfmark::embedding::EmbeddingService;
use shelfmark::init::AppContext;
use shelfmark::repository::{CatalogStore, InMemoryCatalogStore};
use shelfmark::services::SearchMode;
use shelfmark::ShelfmarkError;

/// Embedder that never answers within any reasonable timeout.
struct StalledEmbedder;

#[async_trait]
impl EmbeddingService for StalledEmbedder {
    async fn embed_text(&self, _text: &str) -> Result<Vec<f32>, ShelfmarkError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec![0.0; 384])
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ShelfmarkError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec![vec![0.0; 384]; texts.len()])
    }

    fn dimensions(&self) -> usize {
        384
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Slow at embedding catalog batches, instant at embedding queries.
struct SlowBatchEmbedder {
    inner: Arc<dyn EmbeddingService + Send + Sync>,
    batch_delay: Duration,
}

impl SlowBatchEmbedder {
    fn new(batch_delay: Duration) -> Self {
        Self {
            inner: hash_embedding_service(),
            batch_delay,
        }
    }
}

#[async_trait]
impl EmbeddingService for SlowBatchEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ShelfmarkError> {
        self.inner.embed_text(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ShelfmarkError> {
        tokio::time::sleep(self.batch_delay).await;
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn is_available(&self) -> bool {
        true
    }
}

async fn catalog() -> Arc<InMemoryCatalogStore> {
    let store = Arc::new(InMemoryCatalogStore::new());
    let books = vec![
        BookBuilder::new(1, "Dragon")
            .description("Dragon dragon dragon.")
            .build(),
        BookBuilder::new(2, "Dragonsong")
            .author("Anne McCaffrey")
            .illustrator("Michael Whelan")
            .description("A girl on Pern who wants to make music.")
            .build(),
        BookBuilder::new(3, "The Secret Garden")
            .author("Frances Hodgson Burnett")
            .description("An orphan finds a locked garden.")
            .build(),
        BookBuilder::new(4, "dragon tales")
            .subtitle("Stories from the mountain")
            .author("Various")
            .build(),
        BookBuilder::new(5, "A Dragon Withdrawn")
            .author("Anne McCaffrey")
            .inactive()
            .build(),
    ];
    for book in books {
        store.upsert_book(book).await.unwrap();
    }
    store
}

async fn context(
    embedder: Arc<dyn EmbeddingService + Send + Sync>,
    config: DiscoveryConfig,
) -> (Arc<InMemoryCatalogStore>, AppContext) {
    let store = catalog().await;
    let ctx = memory_context(store.clone(), embedder, config);
    (store, ctx)
}

#[tokio::test]
async fn test_semantic_search_warms_cold_cache() {
    let (store, ctx) = context(hash_embedding_service(), DiscoveryConfig::default()).await;
    assert_eq!(store.embedding_count().await, 0);

    let response = ctx.discovery.search("dragon", None).await.unwrap();

    assert_eq!(response.mode, SearchMode::Semantic);
    assert_eq!(store.embedding_count().await, 4);
    assert_eq!(response.books[0].book.book_id, 1);
    let distance = response.books[0].distance.expect("semantic hits carry a distance");
    assert!(distance < 1e-4);
    assert!(!response.book_ids().contains(&5));
}

#[tokio::test]
async fn test_semantic_results_are_deterministic() {
    let (_store, ctx) = context(hash_embedding_service(), DiscoveryConfig::default()).await;

    let first = ctx.discovery.search("music on Pern", Some(4)).await.unwrap();
    let second = ctx.discovery.search("music on Pern", Some(4)).await.unwrap();

    assert_eq!(first.mode, SearchMode::Semantic);
    assert_eq!(first.book_ids(), second.book_ids());
    let distances: Vec<Option<f32>> = first.books.iter().map(|b| b.distance).collect();
    let again: Vec<Option<f32>> = second.books.iter().map(|b| b.distance).collect();
    assert_eq!(distances, again);
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_default_limit_and_clamping() {
    let mut config = DiscoveryConfig::default();
    config.search.default_limit = 2;
    config.search.max_limit = 3;
    let (_store, ctx) = context(hash_embedding_service(), config).await;

    let defaulted = ctx.discovery.search("dragon", None).await.unwrap();
    assert_eq!(defaulted.books.len(), 2);

    let clamped = ctx.discovery.search("dragon", Some(100)).await.unwrap();
    assert_eq!(clamped.books.len(), 3);
}

#[tokio::test]
async fn test_unavailable_model_falls_back_to_keywords() {
    let (store, ctx) = context(test_embedding_service(), DiscoveryConfig::default()).await;

    let response = ctx.discovery.search("dragon", None).await.unwrap();

    assert_eq!(response.mode, SearchMode::KeywordFallback);
    assert_eq!(store.embedding_count().await, 0);
    // Title order, case-insensitive, inactive book excluded.
    assert_eq!(response.book_ids(), vec![1, 4, 2]);
    assert!(response.books.iter().all(|b| b.distance.is_none()));
}

#[tokio::test]
async fn test_keyword_fallback_requires_every_word() {
    let (_store, ctx) = context(test_embedding_service(), DiscoveryConfig::default()).await;

    let by_author = ctx.discovery.search("dragon mccaffrey", None).await.unwrap();
    assert_eq!(by_author.book_ids(), vec![2]);

    let by_subtitle = ctx.discovery.search("MOUNTAIN", None).await.unwrap();
    assert_eq!(by_subtitle.book_ids(), vec![4]);

    let nothing = ctx.discovery.search("dragon zeppelin", None).await.unwrap();
    assert_eq!(nothing.mode, SearchMode::KeywordFallback);
    assert!(nothing.books.is_empty());
}

#[tokio::test]
async fn test_illustrators_do_not_match_keywords() {
    let (_store, ctx) = context(test_embedding_service(), DiscoveryConfig::default()).await;

    let response = ctx.discovery.search("whelan", None).await.unwrap();
    assert!(response.books.is_empty());
}

#[tokio::test]
async fn test_disabled_semantic_goes_straight_to_keywords() {
    let mut config = DiscoveryConfig::default();
    config.search.semantic_enabled = false;
    let (store, ctx) = context(hash_embedding_service(), config).await;

    let response = ctx.discovery.search("garden", None).await.unwrap();

    assert_eq!(response.mode, SearchMode::KeywordFallback);
    assert_eq!(response.book_ids(), vec![3]);
    assert_eq!(store.embedding_count().await, 0);
}

#[tokio::test]
async fn test_timeout_falls_back_to_keywords() {
    let mut config = DiscoveryConfig::default();
    config.search.query_timeout_ms = 50;
    config.search.backfill_wait_ms = 10;
    let (_store, ctx) = context(Arc::new(StalledEmbedder), config).await;

    let response = ctx.discovery.search("garden", None).await.unwrap();

    assert_eq!(response.mode, SearchMode::KeywordFallback);
    assert_eq!(response.book_ids(), vec![3]);
}

#[tokio::test]
async fn test_slow_backfill_does_not_count_against_query_timeout() {
    let mut config = DiscoveryConfig::default();
    config.search.query_timeout_ms = 100;
    let embedder = Arc::new(SlowBatchEmbedder::new(Duration::from_millis(200)));
    let (store, ctx) = context(embedder, config).await;

    let response = ctx.discovery.search("dragon", None).await.unwrap();

    assert_eq!(response.mode, SearchMode::Semantic);
    assert_eq!(response.books[0].book.book_id, 1);
    assert_eq!(store.embedding_count().await, 4);
}

#[tokio::test]
async fn test_backfill_outliving_its_wait_still_fills_cache() {
    let mut config = DiscoveryConfig::default();
    config.search.query_timeout_ms = 100;
    config.search.backfill_wait_ms = 20;
    let embedder = Arc::new(SlowBatchEmbedder::new(Duration::from_millis(200)));
    let (store, ctx) = context(embedder, config).await;

    let first = ctx.discovery.search("dragon", None).await.unwrap();
    assert_eq!(first.mode, SearchMode::KeywordFallback);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(store.embedding_count().await, 4);

    let second = ctx.discovery.search("dragon", None).await.unwrap();
    assert_eq!(second.mode, SearchMode::Semantic);
    assert_eq!(second.books[0].book.book_id, 1);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let (_store, ctx) = context(hash_embedding_service(), DiscoveryConfig::default()).await;

    let blank = ctx.discovery.search("   ", None).await.unwrap_err();
    assert!(matches!(blank, ShelfmarkError::Validation(_)));

    let zero = ctx.discovery.search("dragon", Some(0)).await.unwrap_err();
    assert!(matches!(zero, ShelfmarkError::Validation(_)));
}

#[tokio::test]
async fn test_mode_labels_serialize_kebab_case() {
    let (_store, ctx) = context(test_embedding_service(), DiscoveryConfig::default()).await;

    let response = ctx.discovery.search("garden", None).await.unwrap();
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["mode"], "keyword-fallback");
    assert!(json.get("error").is_none());
    assert_eq!(json["books"][0]["book"]["title"], "The Secret Garden");
}
