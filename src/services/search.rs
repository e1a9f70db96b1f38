//! Catalog search: nearest-neighbour retrieval over the embedding cache,
//! keyword matching over metadata, and the composition of the two.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::embedding::{BackfillService, EmbeddingService};
use crate::models::{BookId, BookSummary, CatalogItem};
use crate::repository::CatalogStore;
use crate::utils::math::euclidean_distance;
use crate::ShelfmarkError;

/// Which path produced a search response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
    Semantic,
    KeywordFallback,
    Error,
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SearchMode::Semantic => "semantic",
            SearchMode::KeywordFallback => "keyword-fallback",
            SearchMode::Error => "error",
        };
        f.write_str(label)
    }
}

/// One hit, in rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedBook {
    pub book: BookSummary,
    /// Euclidean distance to the query vector; absent for keyword hits.
    pub distance: Option<f32>,
}

/// Result of a composed search. Never carries a raw internal error: failures
/// surface as `mode = error` with a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub books: Vec<RankedBook>,
    pub mode: SearchMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    fn new(books: Vec<RankedBook>, mode: SearchMode) -> Self {
        Self {
            books,
            mode,
            error: None,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            books: Vec::new(),
            mode: SearchMode::Error,
            error: Some(message),
        }
    }

    pub fn book_ids(&self) -> Vec<BookId> {
        self.books.iter().map(|r| r.book.book_id).collect()
    }
}

/// Join ranked ids with display metadata, keeping rank order.
///
/// Ids whose book is no longer active are dropped.
pub(crate) async fn load_summaries(
    store: &dyn CatalogStore,
    ranked: &[(BookId, Option<f32>)],
) -> Result<Vec<RankedBook>, ShelfmarkError> {
    if ranked.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<BookId> = ranked.iter().map(|(id, _)| *id).collect();
    let (books, ratings) =
        futures::try_join!(store.books_by_ids(&ids), store.rating_aggregates(&ids))?;
    let books: HashMap<BookId, CatalogItem> =
        books.into_iter().map(|b| (b.book_id, b)).collect();

    Ok(ranked
        .iter()
        .filter_map(|(id, distance)| {
            books.get(id).map(|item| RankedBook {
                book: BookSummary::from_item(item, ratings.get(id).copied().unwrap_or_default()),
                distance: *distance,
            })
        })
        .collect())
}

fn clamp_limit(limit: usize, max_limit: usize) -> Result<usize, ShelfmarkError> {
    if limit == 0 {
        return Err(ShelfmarkError::Validation(
            "limit must be positive".to_string(),
        ));
    }
    Ok(limit.min(max_limit))
}

/// Nearest-neighbour search over the embedding cache.
pub struct VectorRetriever {
    store: Arc<dyn CatalogStore>,
    embedding_service: Arc<dyn EmbeddingService + Send + Sync>,
    backfill: Arc<BackfillService>,
    max_limit: usize,
}

impl VectorRetriever {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        embedding_service: Arc<dyn EmbeddingService + Send + Sync>,
        backfill: Arc<BackfillService>,
        max_limit: usize,
    ) -> Self {
        Self {
            store,
            embedding_service,
            backfill,
            max_limit,
        }
    }

    /// Start a best-effort backfill and wait up to `wait` for it.
    ///
    /// The run is a spawned task, so one that outlives `wait` still writes
    /// its batch for later searches.
    pub async fn warm_cache(&self, wait: Duration) {
        let backfill = Arc::clone(&self.backfill);
        let run = tokio::spawn(async move { backfill.try_backfill().await });
        match tokio::time::timeout(wait, run).await {
            Ok(Ok(Some(stats))) if stats.embedded > 0 => {
                debug!(embedded = stats.embedded, "Warmed cache before search");
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Backfill task aborted: {}", e),
            Err(_) => debug!(
                wait_ms = wait.as_millis() as u64,
                "Backfill still running; searching the current cache"
            ),
        }
    }

    /// Books nearest to `query`, ascending by distance then id.
    ///
    /// Only active books with a cached vector can appear. An empty query yields an empty list; an embedder
    /// failure on the query itself is returned to the caller.
    pub async fn retrieve(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RankedBook>, ShelfmarkError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let limit = clamp_limit(limit, self.max_limit)?;

        let query_vector = self.embedding_service.embed_text(query).await?;
        let dimensions = self.embedding_service.dimensions();
        if query_vector.len() != dimensions {
            return Err(ShelfmarkError::Embedding(format!(
                "query vector has {} dimensions, expected {}",
                query_vector.len(),
                dimensions
            )));
        }

        let records = self.store.embeddings().await?;
        let mut skipped = 0usize;
        let mut scored: Vec<(BookId, f32)> = records
            .iter()
            .filter_map(|record| {
                if record.dimensions() != dimensions {
                    skipped += 1;
                    return None;
                }
                Some((
                    record.book_id,
                    euclidean_distance(&record.embedding, &query_vector),
                ))
            })
            .collect();
        if skipped > 0 {
            warn!(
                skipped,
                expected = dimensions,
                "Ignored cached vectors with mismatched dimensions"
            );
        }

        scored.sort_by(compare_ranked);
        scored.truncate(limit);

        let ranked: Vec<(BookId, Option<f32>)> =
            scored.into_iter().map(|(id, d)| (id, Some(d))).collect();
        load_summaries(self.store.as_ref(), &ranked).await
    }
}

/// Conjunctive keyword matching over title, subtitle and author names.
pub struct KeywordRetriever {
    store: Arc<dyn CatalogStore>,
    max_limit: usize,
}

impl KeywordRetriever {
    pub fn new(store: Arc<dyn CatalogStore>, max_limit: usize) -> Self {
        Self { store, max_limit }
    }

    /// Active books where every whitespace-separated word of `query` occurs
    /// (case-insensitively) in the title, the subtitle or an author name.
    /// Ordered by title, then id.
    pub async fn keyword_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RankedBook>, ShelfmarkError> {
        let limit = clamp_limit(limit, self.max_limit)?;
        let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let mut matches: Vec<(String, BookId)> = self
            .store
            .active_books()
            .await?
            .into_iter()
            .filter(|book| matches_all(book, &words))
            .map(|book| (book.title.to_lowercase(), book.book_id))
            .collect();
        matches.sort();
        matches.truncate(limit);

        let ranked: Vec<(BookId, Option<f32>)> =
            matches.into_iter().map(|(_, id)| (id, None)).collect();
        load_summaries(self.store.as_ref(), &ranked).await
    }
}

fn matches_all(book: &CatalogItem, words: &[String]) -> bool {
    let mut fields: Vec<String> = Vec::with_capacity(2 + book.contributors.len());
    fields.push(book.title.to_lowercase());
    if let Some(subtitle) = &book.subtitle {
        fields.push(subtitle.to_lowercase());
    }
    fields.extend(book.authors().into_iter().map(str::to_lowercase));

    words
        .iter()
        .all(|word| fields.iter().any(|field| field.contains(word.as_str())))
}

/// Search entry point: semantic first, keyword matching when that yields
/// nothing, fails or times out.
pub struct DiscoveryService {
    retriever: VectorRetriever,
    keywords: KeywordRetriever,
    config: SearchConfig,
}

impl DiscoveryService {
    pub fn new(
        retriever: VectorRetriever,
        keywords: KeywordRetriever,
        config: SearchConfig,
    ) -> Self {
        Self {
            retriever,
            keywords,
            config,
        }
    }

    /// Run a composed search.
    ///
    /// The cache warm-up is bounded by `backfill_wait_ms`; only the query
    /// embedding and the scan count against `query_timeout_ms`.
    /// `limit` defaults to the configured default and is clamped to the
    /// configured maximum. Blank queries and a zero limit are rejected before
    /// anything else runs.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<SearchResponse, ShelfmarkError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ShelfmarkError::Validation(
                "query must not be empty".to_string(),
            ));
        }
        let limit = clamp_limit(
            limit.unwrap_or(self.config.default_limit),
            self.config.max_limit,
        )?;

        if self.config.semantic_enabled {
            self.retriever.warm_cache(self.config.backfill_wait()).await;
            let timeout = self.config.query_timeout();
            let attempt =
                tokio::time::timeout(timeout, self.retriever.retrieve(query, limit)).await;
            match attempt {
                Ok(Ok(books)) if !books.is_empty() => {
                    return Ok(SearchResponse::new(books, SearchMode::Semantic));
                }
                Ok(Ok(_)) => info!("Semantic search found nothing; using keyword fallback"),
                Ok(Err(e)) => warn!("Semantic search failed: {}; using keyword fallback", e),
                Err(_) => warn!(
                    timeout_ms = self.config.query_timeout_ms,
                    "Semantic search timed out; using keyword fallback"
                ),
            }
        }

        match self.keywords.keyword_search(query, limit).await {
            Ok(books) => Ok(SearchResponse::new(books, SearchMode::KeywordFallback)),
            Err(e) => {
                warn!("Keyword search failed: {}", e);
                Ok(SearchResponse::failed(e.to_string()))
            }
        }
    }
}

/// Ascending distance, ties by id.
pub fn compare_ranked(a: &(BookId, f32), b: &(BookId, f32)) -> Ordering {
    a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0))
}
