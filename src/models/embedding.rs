use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::BookId;

/// Cached vector for one catalog item.
///
/// At most one record exists per `book_id`; writes overwrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub book_id: BookId,
    pub embedding: Vec<f32>,
    /// SHA-256 of the composite text the vector was computed from.
    pub content_hash: String,
    pub updated_at: DateTime<Utc>,
}

impl EmbeddingRecord {
    pub fn new(book_id: BookId, embedding: Vec<f32>, content_hash: String) -> Self {
        Self {
            book_id,
            embedding,
            content_hash,
            updated_at: Utc::now(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.embedding.len()
    }
}

/// Coverage of the embedding cache over the active catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmbeddingCoverage {
    pub active_items: usize,
    pub embedded: usize,
    pub missing: usize,
    pub stale: usize,
}
