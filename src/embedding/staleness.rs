//! Embedding staleness management.
//!
//! A cached vector is stale when the book's current composite text no longer
//! hashes to the `content_hash` stored beside it.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::embedding::backfill::{BackfillService, BackfillStats};
use crate::embedding::composite::{book_composite, content_hash};
use crate::models::{BookId, CatalogItem, EmbeddingCoverage};
use crate::repository::CatalogStore;
use crate::ShelfmarkError;

/// Detects and repairs cache entries that drifted from the catalog.
pub struct StalenessManager {
    store: Arc<dyn CatalogStore>,
    backfill: Arc<BackfillService>,
}

impl StalenessManager {
    pub fn new(store: Arc<dyn CatalogStore>, backfill: Arc<BackfillService>) -> Self {
        Self { store, backfill }
    }

    /// Active books whose cached vector was computed from different text,
    /// ascending by id.
    pub async fn stale_books(&self, limit: usize) -> Result<Vec<CatalogItem>, ShelfmarkError> {
        let hashes = self.stored_hashes().await?;
        let books = self.store.active_books().await?;

        let mut stale: Vec<CatalogItem> = books
            .into_iter()
            .filter(|book| {
                hashes
                    .get(&book.book_id)
                    .is_some_and(|stored| *stored != content_hash(&book_composite(book)))
            })
            .collect();
        stale.sort_by_key(|b| b.book_id);
        stale.truncate(limit);
        Ok(stale)
    }

    /// Re-embed up to `batch_size` stale books, overwriting their records.
    pub async fn refresh_stale(&self, batch_size: usize) -> Result<BackfillStats, ShelfmarkError> {
        if batch_size == 0 {
            return Err(ShelfmarkError::Validation(
                "batch_size must be positive".to_string(),
            ));
        }
        let stale = self.stale_books(batch_size).await?;
        if stale.is_empty() {
            return Ok(BackfillStats::default());
        }

        let selected = stale.len();
        let records = self.backfill.embed_items(&stale).await?;
        let embedded = self.store.upsert_embeddings(records).await?;

        info!(selected, embedded, "Refreshed stale embeddings");
        Ok(BackfillStats { selected, embedded })
    }

    /// Drop one cached vector so the next backfill recomputes it.
    pub async fn invalidate(&self, book_id: BookId) -> Result<bool, ShelfmarkError> {
        let removed = self.store.delete_embedding(book_id).await?;
        if removed {
            info!(book_id, "Invalidated embedding");
        }
        Ok(removed)
    }

    /// Delete vectors of books that are no longer active.
    pub async fn purge_inactive(&self) -> Result<usize, ShelfmarkError> {
        let purged = self.store.purge_inactive_embeddings().await?;
        if purged > 0 {
            info!(purged, "Purged embeddings of inactive books");
        }
        Ok(purged)
    }

    pub async fn coverage(&self) -> Result<EmbeddingCoverage, ShelfmarkError> {
        let hashes = self.stored_hashes().await?;
        let books = self.store.active_books().await?;

        let mut coverage = EmbeddingCoverage {
            active_items: books.len(),
            ..Default::default()
        };
        for book in &books {
            match hashes.get(&book.book_id) {
                Some(stored) => {
                    coverage.embedded += 1;
                    if *stored != content_hash(&book_composite(book)) {
                        coverage.stale += 1;
                    }
                }
                None => coverage.missing += 1,
            }
        }
        Ok(coverage)
    }

    async fn stored_hashes(&self) -> Result<HashMap<BookId, String>, ShelfmarkError> {
        Ok(self
            .store
            .embeddings()
            .await?
            .into_iter()
            .map(|r| (r.book_id, r.content_hash))
            .collect())
    }
}
