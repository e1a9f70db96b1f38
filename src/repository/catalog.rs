use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::connection::ShelfmarkDb;
use crate::models::{
    BookId, CatalogItem, CatalogSnapshot, EmbeddingRecord, Interaction, InteractionHistory,
    InteractionKind, ItemStats, Patron, PatronId, PatronInteraction, RatingAggregate, Review,
};
use crate::ShelfmarkError;

/// Read access to the catalog plus ownership of the embedding cache.
///
/// Catalog rows (books, patrons, interactions, reviews) belong to circulation;
/// the write methods for them exist for loading snapshots and fixtures.
/// The embedding cache is the only thing discovery mutates in normal operation.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // Catalog reads
    async fn active_books(&self) -> Result<Vec<CatalogItem>, ShelfmarkError>;
    /// Active books among `ids`, in no particular order.
    async fn books_by_ids(&self, ids: &[BookId]) -> Result<Vec<CatalogItem>, ShelfmarkError>;
    /// A book regardless of its active flag.
    async fn get_book(&self, id: BookId) -> Result<Option<CatalogItem>, ShelfmarkError>;
    async fn rating_aggregates(
        &self,
        ids: &[BookId],
    ) -> Result<HashMap<BookId, RatingAggregate>, ShelfmarkError>;
    async fn patron_exists(&self, patron_id: PatronId) -> Result<bool, ShelfmarkError>;
    async fn interaction_history(
        &self,
        patron_id: PatronId,
    ) -> Result<InteractionHistory, ShelfmarkError>;
    /// Ranking signals for every book, inactive ones included.
    async fn item_stats(&self) -> Result<Vec<ItemStats>, ShelfmarkError>;

    // Embedding cache
    /// Active books with no cached embedding, ascending by id.
    async fn books_missing_embeddings(
        &self,
        limit: usize,
    ) -> Result<Vec<CatalogItem>, ShelfmarkError>;
    /// Cached embeddings of active books.
    async fn embeddings(&self) -> Result<Vec<EmbeddingRecord>, ShelfmarkError>;
    /// Insert or overwrite all records in one atomic write.
    async fn upsert_embeddings(
        &self,
        records: Vec<EmbeddingRecord>,
    ) -> Result<usize, ShelfmarkError>;
    async fn delete_embedding(&self, id: BookId) -> Result<bool, ShelfmarkError>;
    /// Drop cache rows whose book is inactive or gone.
    async fn purge_inactive_embeddings(&self) -> Result<usize, ShelfmarkError>;

    // Catalog writes
    async fn upsert_book(&self, book: CatalogItem) -> Result<(), ShelfmarkError>;
    async fn upsert_patron(&self, patron: Patron) -> Result<(), ShelfmarkError>;
    async fn record_interaction(&self, row: PatronInteraction) -> Result<(), ShelfmarkError>;
    async fn add_review(&self, review: Review) -> Result<(), ShelfmarkError>;

    async fn load_snapshot(&self, snapshot: CatalogSnapshot) -> Result<(), ShelfmarkError> {
        for book in snapshot.books {
            self.upsert_book(book).await?;
        }
        for patron in snapshot.patrons {
            self.upsert_patron(patron).await?;
        }
        for row in snapshot.interactions {
            self.record_interaction(row).await?;
        }
        for review in snapshot.reviews {
            self.add_review(review).await?;
        }
        Ok(())
    }
}

const BOOK_FIELDS: &str = "book_id, title, subtitle, description, collection_name, age_rating, \
     genre, sub_genre, contributors, is_active, available_items, total_items";

/// Embedding cache row as stored: timestamps are RFC 3339 strings.
#[derive(Debug, Serialize, Deserialize)]
struct EmbeddingRow {
    book_id: BookId,
    embedding: Vec<f32>,
    content_hash: String,
    updated_at: String,
}

impl From<EmbeddingRecord> for EmbeddingRow {
    fn from(record: EmbeddingRecord) -> Self {
        Self {
            book_id: record.book_id,
            embedding: record.embedding,
            content_hash: record.content_hash,
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

impl TryFrom<EmbeddingRow> for EmbeddingRecord {
    type Error = ShelfmarkError;

    fn try_from(row: EmbeddingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            book_id: row.book_id,
            embedding: row.embedding,
            content_hash: row.content_hash,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct InteractionRow {
    patron_id: PatronId,
    book_id: BookId,
    kind: InteractionKind,
    occurred_at: String,
}

#[derive(Debug, Deserialize)]
struct PopularityRow {
    book_id: BookId,
    patron_id: PatronId,
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ShelfmarkError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ShelfmarkError::Database(format!("Invalid timestamp '{}': {}", value, e)))
}

/// SurrealDB implementation of CatalogStore.
pub struct SurrealCatalogStore {
    db: Arc<ShelfmarkDb>,
}

impl SurrealCatalogStore {
    /// Create a new store with the given database connection.
    pub fn new(db: Arc<ShelfmarkDb>) -> Self {
        Self { db }
    }

    async fn reviews_for(&self, ids: &[BookId]) -> Result<Vec<Review>, ShelfmarkError> {
        let mut result = self
            .db
            .query("SELECT book_id, patron_id, rating FROM review WHERE book_id INSIDE $ids")
            .bind(("ids", ids.to_vec()))
            .await?;
        let reviews: Vec<Review> = result.take(0)?;
        Ok(reviews)
    }
}

#[async_trait]
impl CatalogStore for SurrealCatalogStore {
    async fn active_books(&self) -> Result<Vec<CatalogItem>, ShelfmarkError> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {BOOK_FIELDS} FROM book WHERE is_active = true ORDER BY book_id"
            ))
            .await?;
        let books: Vec<CatalogItem> = result.take(0)?;
        Ok(books)
    }

    async fn books_by_ids(&self, ids: &[BookId]) -> Result<Vec<CatalogItem>, ShelfmarkError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut result = self
            .db
            .query(format!(
                "SELECT {BOOK_FIELDS} FROM book WHERE is_active = true AND book_id INSIDE $ids"
            ))
            .bind(("ids", ids.to_vec()))
            .await?;
        let books: Vec<CatalogItem> = result.take(0)?;
        Ok(books)
    }

    async fn get_book(&self, id: BookId) -> Result<Option<CatalogItem>, ShelfmarkError> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {BOOK_FIELDS} FROM book WHERE book_id = $id LIMIT 1"
            ))
            .bind(("id", id))
            .await?;
        let books: Vec<CatalogItem> = result.take(0)?;
        Ok(books.into_iter().next())
    }

    async fn rating_aggregates(
        &self,
        ids: &[BookId],
    ) -> Result<HashMap<BookId, RatingAggregate>, ShelfmarkError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let reviews = self.reviews_for(ids).await?;
        Ok(crate::models::rating_aggregates(&reviews))
    }

    async fn patron_exists(&self, patron_id: PatronId) -> Result<bool, ShelfmarkError> {
        let mut result = self
            .db
            .query("SELECT VALUE patron_id FROM patron WHERE patron_id = $id LIMIT 1")
            .bind(("id", patron_id))
            .await?;
        let ids: Vec<PatronId> = result.take(0)?;
        Ok(!ids.is_empty())
    }

    async fn interaction_history(
        &self,
        patron_id: PatronId,
    ) -> Result<InteractionHistory, ShelfmarkError> {
        let mut result = self
            .db
            .query(
                "SELECT patron_id, book_id, kind, occurred_at FROM interaction \
                 WHERE patron_id = $id",
            )
            .bind(("id", patron_id))
            .await?;
        let rows: Vec<InteractionRow> = result.take(0)?;
        let entries = rows
            .into_iter()
            .map(|row| {
                Ok(Interaction {
                    book_id: row.book_id,
                    kind: row.kind,
                    occurred_at: parse_timestamp(&row.occurred_at)?,
                })
            })
            .collect::<Result<Vec<_>, ShelfmarkError>>()?;
        Ok(InteractionHistory::new(patron_id, entries))
    }

    async fn item_stats(&self) -> Result<Vec<ItemStats>, ShelfmarkError> {
        let mut result = self
            .db
            .query(format!("SELECT {BOOK_FIELDS} FROM book ORDER BY book_id"))
            .query("SELECT book_id, patron_id FROM interaction")
            .query("SELECT book_id, patron_id, rating FROM review")
            .await?;
        let books: Vec<CatalogItem> = result.take(0)?;
        let interactions: Vec<PopularityRow> = result.take(1)?;
        let reviews: Vec<Review> = result.take(2)?;

        let pairs: Vec<(BookId, PatronId)> = interactions
            .into_iter()
            .map(|row| (row.book_id, row.patron_id))
            .collect();
        Ok(ItemStats::aggregate(&books, &pairs, &reviews))
    }

    async fn books_missing_embeddings(
        &self,
        limit: usize,
    ) -> Result<Vec<CatalogItem>, ShelfmarkError> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {BOOK_FIELDS} FROM book \
                 WHERE is_active = true \
                 AND book_id NOTINSIDE (SELECT VALUE book_id FROM book_embedding) \
                 ORDER BY book_id LIMIT $limit"
            ))
            .bind(("limit", limit))
            .await?;
        let books: Vec<CatalogItem> = result.take(0)?;
        Ok(books)
    }

    async fn embeddings(&self) -> Result<Vec<EmbeddingRecord>, ShelfmarkError> {
        let mut result = self
            .db
            .query(
                "SELECT book_id, embedding, content_hash, updated_at FROM book_embedding \
                 WHERE book_id INSIDE (SELECT VALUE book_id FROM book WHERE is_active = true) \
                 ORDER BY book_id",
            )
            .await?;
        let rows: Vec<EmbeddingRow> = result.take(0)?;
        rows.into_iter().map(EmbeddingRecord::try_from).collect()
    }

    async fn upsert_embeddings(
        &self,
        records: Vec<EmbeddingRecord>,
    ) -> Result<usize, ShelfmarkError> {
        if records.is_empty() {
            return Ok(0);
        }
        let count = records.len();
        let rows: Vec<EmbeddingRow> = records.into_iter().map(EmbeddingRow::from).collect();

        let response = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 FOR $rec IN $records { \
                     UPSERT type::thing('book_embedding', $rec.book_id) CONTENT $rec; \
                 }; \
                 COMMIT TRANSACTION;",
            )
            .bind(("records", rows))
            .await
            .map_err(|e| ShelfmarkError::CacheWrite(e.to_string()))?;
        response
            .check()
            .map_err(|e| ShelfmarkError::CacheWrite(e.to_string()))?;
        Ok(count)
    }

    async fn delete_embedding(&self, id: BookId) -> Result<bool, ShelfmarkError> {
        let mut result = self
            .db
            .query("SELECT VALUE book_id FROM book_embedding WHERE book_id = $id")
            .query("DELETE book_embedding WHERE book_id = $id")
            .bind(("id", id))
            .await?;
        let existing: Vec<BookId> = result.take(0)?;
        Ok(!existing.is_empty())
    }

    async fn purge_inactive_embeddings(&self) -> Result<usize, ShelfmarkError> {
        let mut result = self
            .db
            .query(
                "SELECT VALUE book_id FROM book_embedding \
                 WHERE book_id NOTINSIDE (SELECT VALUE book_id FROM book WHERE is_active = true)",
            )
            .await?;
        let orphaned: Vec<BookId> = result.take(0)?;
        if orphaned.is_empty() {
            return Ok(0);
        }

        self.db
            .query("DELETE book_embedding WHERE book_id INSIDE $ids")
            .bind(("ids", orphaned.clone()))
            .await?
            .check()?;
        Ok(orphaned.len())
    }

    async fn upsert_book(&self, book: CatalogItem) -> Result<(), ShelfmarkError> {
        self.db
            .query("UPSERT type::thing('book', $id) CONTENT $book")
            .bind(("id", book.book_id))
            .bind(("book", book))
            .await?
            .check()?;
        Ok(())
    }

    async fn upsert_patron(&self, patron: Patron) -> Result<(), ShelfmarkError> {
        self.db
            .query("UPSERT type::thing('patron', $id) CONTENT $patron")
            .bind(("id", patron.patron_id))
            .bind(("patron", patron))
            .await?
            .check()?;
        Ok(())
    }

    async fn record_interaction(&self, row: PatronInteraction) -> Result<(), ShelfmarkError> {
        let row = InteractionRow {
            patron_id: row.patron_id,
            book_id: row.book_id,
            kind: row.kind,
            occurred_at: row.occurred_at.to_rfc3339(),
        };
        self.db
            .query("CREATE interaction CONTENT $row")
            .bind(("row", row))
            .await?
            .check()?;
        Ok(())
    }

    async fn add_review(&self, review: Review) -> Result<(), ShelfmarkError> {
        self.db
            .query("CREATE review CONTENT $review")
            .bind(("review", review))
            .await?
            .check()?;
        Ok(())
    }
}
