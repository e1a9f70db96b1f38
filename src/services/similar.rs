use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::{BookId, BookSummary, ItemStats};
use crate::repository::CatalogStore;
use crate::services::recommend::rating_desc_nulls_last;
use crate::services::search::load_summaries;
use crate::ShelfmarkError;

/// A book related to a target by shared attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarBook {
    pub book: BookSummary,
    /// 1 = same genre and sub-genre, 2 = same genre, 3 = shared author, 4 = other.
    pub tier: u8,
}

/// How closely `candidate` relates to `target`, or `None` if unrelated.
///
/// Related means sharing the genre, the sub-genre or an author. A shared
/// sub-genre alone lands in the last tier.
pub fn similarity_tier(target: &ItemStats, candidate: &ItemStats) -> Option<u8> {
    let same_genre = same_value(&target.genre, &candidate.genre);
    let same_sub_genre = same_value(&target.sub_genre, &candidate.sub_genre);
    let authors: HashSet<&String> = target.authors.iter().collect();
    let shared_author = candidate.authors.iter().any(|a| authors.contains(a));

    if same_genre && same_sub_genre {
        Some(1)
    } else if same_genre {
        Some(2)
    } else if shared_author {
        Some(3)
    } else if same_sub_genre {
        Some(4)
    } else {
        None
    }
}

fn same_value(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}

pub struct SimilarService {
    store: Arc<dyn CatalogStore>,
}

impl SimilarService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Available books sharing genre, sub-genre or an author with `book_id`,
    /// by tier, then popularity, then rating (nulls last), then id.
    ///
    /// An unknown book yields an empty list.
    pub async fn similar(
        &self,
        book_id: BookId,
        limit: usize,
    ) -> Result<Vec<SimilarBook>, ShelfmarkError> {
        if limit == 0 {
            return Err(ShelfmarkError::Validation(
                "limit must be positive".to_string(),
            ));
        }
        let items = self.store.item_stats().await?;
        let Some(target) = items.iter().find(|i| i.book_id == book_id) else {
            return Ok(Vec::new());
        };

        let mut related: Vec<(u8, &ItemStats)> = items
            .iter()
            .filter(|c| c.book_id != book_id && c.is_available())
            .filter_map(|c| similarity_tier(target, c).map(|tier| (tier, c)))
            .collect();
        related.sort_by(|(ta, a), (tb, b)| {
            ta.cmp(tb)
                .then_with(|| b.popularity.cmp(&a.popularity))
                .then_with(|| rating_desc_nulls_last(a.avg_rating, b.avg_rating))
                .then_with(|| a.book_id.cmp(&b.book_id))
        });
        related.truncate(limit);

        let ranked: Vec<(BookId, Option<f32>)> =
            related.iter().map(|(_, c)| (c.book_id, None)).collect();
        let tiers: HashMap<BookId, u8> = related.iter().map(|(t, c)| (c.book_id, *t)).collect();
        let summaries = load_summaries(self.store.as_ref(), &ranked).await?;

        Ok(summaries
            .into_iter()
            .filter_map(|hit| {
                tiers.get(&hit.book.book_id).map(|tier| SimilarBook {
                    tier: *tier,
                    book: hit.book,
                })
            })
            .collect())
    }
}
