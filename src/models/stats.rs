//! Per-item ranking signals shared by the recommendation stages.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::{BookId, CatalogItem, PatronId, RatingAggregate, Review};

/// Ranking inputs for one catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStats {
    pub book_id: BookId,
    pub genre: Option<String>,
    pub sub_genre: Option<String>,
    pub age_rating: Option<String>,
    pub authors: Vec<String>,
    pub is_active: bool,
    pub available_items: u32,
    /// Distinct patrons with any interaction on the item.
    pub popularity: u32,
    pub avg_rating: Option<f64>,
    pub review_count: u32,
}

impl ItemStats {
    pub fn is_available(&self) -> bool {
        self.is_active && self.available_items > 0
    }

    /// Compute stats for every book from raw interaction and review rows.
    ///
    /// `interactions` are `(book_id, patron_id)` pairs; duplicates from the same
    /// patron count once.
    pub fn aggregate(
        books: &[CatalogItem],
        interactions: &[(BookId, PatronId)],
        reviews: &[Review],
    ) -> Vec<ItemStats> {
        let mut patrons: HashMap<BookId, HashSet<PatronId>> = HashMap::new();
        for (book_id, patron_id) in interactions {
            patrons.entry(*book_id).or_default().insert(*patron_id);
        }

        let ratings = rating_aggregates(reviews);

        books
            .iter()
            .map(|book| {
                let rating = ratings.get(&book.book_id).copied().unwrap_or_default();
                ItemStats {
                    book_id: book.book_id,
                    genre: book.genre.clone(),
                    sub_genre: book.sub_genre.clone(),
                    age_rating: book.age_rating.clone(),
                    authors: book.authors().into_iter().map(String::from).collect(),
                    is_active: book.is_active,
                    available_items: book.available_items,
                    popularity: patrons
                        .get(&book.book_id)
                        .map(|p| p.len() as u32)
                        .unwrap_or(0),
                    avg_rating: rating.avg_rating,
                    review_count: rating.review_count,
                }
            })
            .collect()
    }
}

/// Group reviews by book into rating aggregates.
pub fn rating_aggregates(reviews: &[Review]) -> HashMap<BookId, RatingAggregate> {
    let mut grouped: HashMap<BookId, Vec<f64>> = HashMap::new();
    for review in reviews {
        grouped.entry(review.book_id).or_default().push(review.rating);
    }
    grouped
        .into_iter()
        .map(|(id, ratings)| (id, RatingAggregate::from_ratings(ratings)))
        .collect()
}
