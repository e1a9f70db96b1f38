use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{
    BookId, CatalogItem, EmbeddingRecord, InteractionHistory, ItemStats, Patron, PatronId,
    PatronInteraction, RatingAggregate, Review,
};
use crate::repository::CatalogStore;
use crate::ShelfmarkError;

#[derive(Default)]
struct CatalogState {
    books: BTreeMap<BookId, CatalogItem>,
    patrons: BTreeMap<PatronId, Patron>,
    interactions: Vec<PatronInteraction>,
    reviews: Vec<Review>,
    embeddings: BTreeMap<BookId, EmbeddingRecord>,
}

/// Process-local catalog store.
///
/// Backs the CLI when no database is wanted and serves as the test double
/// for the discovery services.
#[derive(Default)]
pub struct InMemoryCatalogStore {
    state: RwLock<CatalogState>,
    fail_embedding_writes: AtomicBool,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent embedding write fail with `CacheWrite`.
    pub fn set_fail_embedding_writes(&self, fail: bool) {
        self.fail_embedding_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of cached rows, including those of inactive books.
    pub async fn embedding_count(&self) -> usize {
        self.state.read().await.embeddings.len()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn active_books(&self) -> Result<Vec<CatalogItem>, ShelfmarkError> {
        let state = self.state.read().await;
        Ok(state
            .books
            .values()
            .filter(|b| b.is_active)
            .cloned()
            .collect())
    }

    async fn books_by_ids(&self, ids: &[BookId]) -> Result<Vec<CatalogItem>, ShelfmarkError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .filter_map(|id| state.books.get(id))
            .filter(|b| b.is_active)
            .cloned()
            .collect())
    }

    async fn get_book(&self, id: BookId) -> Result<Option<CatalogItem>, ShelfmarkError> {
        Ok(self.state.read().await.books.get(&id).cloned())
    }

    async fn rating_aggregates(
        &self,
        ids: &[BookId],
    ) -> Result<HashMap<BookId, RatingAggregate>, ShelfmarkError> {
        let wanted: HashSet<BookId> = ids.iter().copied().collect();
        let state = self.state.read().await;
        let reviews: Vec<Review> = state
            .reviews
            .iter()
            .filter(|r| wanted.contains(&r.book_id))
            .cloned()
            .collect();
        Ok(crate::models::rating_aggregates(&reviews))
    }

    async fn patron_exists(&self, patron_id: PatronId) -> Result<bool, ShelfmarkError> {
        Ok(self.state.read().await.patrons.contains_key(&patron_id))
    }

    async fn interaction_history(
        &self,
        patron_id: PatronId,
    ) -> Result<InteractionHistory, ShelfmarkError> {
        let state = self.state.read().await;
        let entries = state
            .interactions
            .iter()
            .filter(|row| row.patron_id == patron_id)
            .cloned()
            .map(|row| row.into_interaction().1)
            .collect();
        Ok(InteractionHistory::new(patron_id, entries))
    }

    async fn item_stats(&self) -> Result<Vec<ItemStats>, ShelfmarkError> {
        let state = self.state.read().await;
        let books: Vec<CatalogItem> = state.books.values().cloned().collect();
        let pairs: Vec<(BookId, PatronId)> = state
            .interactions
            .iter()
            .map(|row| (row.book_id, row.patron_id))
            .collect();
        Ok(ItemStats::aggregate(&books, &pairs, &state.reviews))
    }

    async fn books_missing_embeddings(
        &self,
        limit: usize,
    ) -> Result<Vec<CatalogItem>, ShelfmarkError> {
        let state = self.state.read().await;
        Ok(state
            .books
            .values()
            .filter(|b| b.is_active && !state.embeddings.contains_key(&b.book_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn embeddings(&self) -> Result<Vec<EmbeddingRecord>, ShelfmarkError> {
        let state = self.state.read().await;
        Ok(state
            .embeddings
            .values()
            .filter(|r| state.books.get(&r.book_id).is_some_and(|b| b.is_active))
            .cloned()
            .collect())
    }

    async fn upsert_embeddings(
        &self,
        records: Vec<EmbeddingRecord>,
    ) -> Result<usize, ShelfmarkError> {
        if self.fail_embedding_writes.load(Ordering::SeqCst) {
            return Err(ShelfmarkError::CacheWrite(
                "embedding writes disabled".to_string(),
            ));
        }
        let count = records.len();
        let mut state = self.state.write().await;
        for record in records {
            state.embeddings.insert(record.book_id, record);
        }
        Ok(count)
    }

    async fn delete_embedding(&self, id: BookId) -> Result<bool, ShelfmarkError> {
        Ok(self.state.write().await.embeddings.remove(&id).is_some())
    }

    async fn purge_inactive_embeddings(&self) -> Result<usize, ShelfmarkError> {
        let mut state = self.state.write().await;
        let CatalogState {
            books, embeddings, ..
        } = &mut *state;
        let before = embeddings.len();
        embeddings.retain(|id, _| books.get(id).is_some_and(|b| b.is_active));
        Ok(before - embeddings.len())
    }

    async fn upsert_book(&self, book: CatalogItem) -> Result<(), ShelfmarkError> {
        self.state.write().await.books.insert(book.book_id, book);
        Ok(())
    }

    async fn upsert_patron(&self, patron: Patron) -> Result<(), ShelfmarkError> {
        self.state
            .write()
            .await
            .patrons
            .insert(patron.patron_id, patron);
        Ok(())
    }

    async fn record_interaction(&self, row: PatronInteraction) -> Result<(), ShelfmarkError> {
        self.state.write().await.interactions.push(row);
        Ok(())
    }

    async fn add_review(&self, review: Review) -> Result<(), ShelfmarkError> {
        self.state.write().await.reviews.push(review);
        Ok(())
    }
}
