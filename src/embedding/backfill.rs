//! Backfill embedding generation for catalog items.
//!
//! Selects active books without a cached vector, embeds them in one batch and
//! writes the whole batch at once.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::embedding::composite::{book_composite, content_hash};
use crate::embedding::EmbeddingService;
use crate::models::{CatalogItem, EmbeddingRecord};
use crate::repository::CatalogStore;
use crate::ShelfmarkError;

/// Statistics from a backfill operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillStats {
    /// Items picked by the anti-join.
    pub selected: usize,
    /// Items written to the cache.
    pub embedded: usize,
}

impl std::ops::AddAssign for BackfillStats {
    fn add_assign(&mut self, other: Self) {
        self.selected += other.selected;
        self.embedded += other.embedded;
    }
}

/// Service for backfilling the embedding cache.
pub struct BackfillService {
    store: Arc<dyn CatalogStore>,
    embedding_service: Arc<dyn EmbeddingService + Send + Sync>,
    batch_size: usize,
    min_interval: Duration,
    /// Held while a best-effort backfill runs; stores when the last one started.
    gate: Mutex<Option<Instant>>,
}

impl BackfillService {
    /// Create a new backfill service.
    ///
    /// `batch_size` bounds the best-effort backfill run before each search;
    /// `min_interval` spaces those runs out (zero disables the debounce).
    pub fn new(
        store: Arc<dyn CatalogStore>,
        embedding_service: Arc<dyn EmbeddingService + Send + Sync>,
        batch_size: usize,
        min_interval: Duration,
    ) -> Self {
        Self {
            store,
            embedding_service,
            batch_size: batch_size.max(1),
            min_interval,
            gate: Mutex::new(None),
        }
    }

    /// Embed up to `batch_size` active books that have no cached vector.
    ///
    /// The embedder is called once for the whole batch. Nothing is written
    /// unless every vector came back well-formed, and the write itself is a
    /// single atomic upsert.
    pub async fn backfill(&self, batch_size: usize) -> Result<BackfillStats, ShelfmarkError> {
        if batch_size == 0 {
            return Err(ShelfmarkError::Validation(
                "batch_size must be positive".to_string(),
            ));
        }

        let missing = self.store.books_missing_embeddings(batch_size).await?;
        if missing.is_empty() {
            debug!("Embedding cache is warm; nothing to backfill");
            return Ok(BackfillStats::default());
        }

        let selected = missing.len();
        let records = self.embed_items(&missing).await?;
        let embedded = self.store.upsert_embeddings(records).await?;

        info!(selected, embedded, "Backfilled embeddings");
        Ok(BackfillStats { selected, embedded })
    }

    /// Run batches until no active book lacks a vector.
    ///
    /// `on_batch` sees the stats of each non-empty batch.
    pub async fn backfill_all<F>(
        &self,
        batch_size: usize,
        mut on_batch: F,
    ) -> Result<BackfillStats, ShelfmarkError>
    where
        F: FnMut(&BackfillStats) + Send,
    {
        let mut total = BackfillStats::default();
        loop {
            let stats = self.backfill(batch_size).await?;
            if stats.selected == 0 {
                break;
            }
            on_batch(&stats);
            total += stats;
            if stats.embedded == 0 || stats.selected < batch_size {
                break;
            }
        }
        Ok(total)
    }

    /// Best-effort backfill used ahead of retrieval.
    ///
    /// Skipped while another run holds the gate or when the previous run
    /// started less than `min_interval` ago. Failures are logged, never returned.
    pub async fn try_backfill(&self) -> Option<BackfillStats> {
        let Ok(mut last_run) = self.gate.try_lock() else {
            debug!("Backfill already in progress; skipping");
            return None;
        };

        if let Some(started) = *last_run {
            if started.elapsed() < self.min_interval {
                debug!("Backfill ran recently; skipping");
                return None;
            }
        }
        *last_run = Some(Instant::now());

        match self.backfill(self.batch_size).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Best-effort backfill failed: {}", e);
                None
            }
        }
    }

    /// Compute cache records for `items` with one embedder call.
    pub(crate) async fn embed_items(
        &self,
        items: &[CatalogItem],
    ) -> Result<Vec<EmbeddingRecord>, ShelfmarkError> {
        let texts: Vec<String> = items.iter().map(book_composite).collect();
        let vectors = self.embedding_service.embed_batch(&texts).await?;

        if vectors.len() != texts.len() {
            return Err(ShelfmarkError::Embedding(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        let dimensions = self.embedding_service.dimensions();
        if let Some((item, v)) = items
            .iter()
            .zip(vectors.iter())
            .find(|(_, v)| v.len() != dimensions)
        {
            return Err(ShelfmarkError::Embedding(format!(
                "vector for book {} has {} dimensions, expected {}",
                item.book_id,
                v.len(),
                dimensions
            )));
        }

        Ok(items
            .iter()
            .zip(texts.iter())
            .zip(vectors)
            .map(|((item, text), vector)| {
                EmbeddingRecord::new(item.book_id, vector, content_hash(text))
            })
            .collect())
    }
}
