//! Personalized recommendations.
//!
//! Three stages run in a fixed order, each filling only what the earlier
//! ones left open:
//!
//! 1. **Affinity**: books in the genres (and age ratings) the patron recently
//!    engaged with, up to half the requested count.
//! 2. **Popular**: most-interacted-with books, restricted to the patron's
//!    preferred age ratings when there are any.
//! 3. **Top rated**: best-reviewed books with enough reviews to trust the average.
//!
//! Every stage excludes what the patron already read or borrowed, everything
//! chosen by an earlier stage, and books with no copy on the shelf.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RecommendConfig;
use crate::models::{BookId, BookSummary, InteractionHistory, ItemStats, PatronId};
use crate::repository::CatalogStore;
use crate::services::search::load_summaries;
use crate::ShelfmarkError;

/// Which stage produced a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Affinity,
    Popular,
    TopRated,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Stage::Affinity => "affinity",
            Stage::Popular => "popular",
            Stage::TopRated => "top_rated",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub book: BookSummary,
    pub stage: Stage,
}

/// Genres and age ratings seen in a patron's recent history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    pub genres: BTreeSet<String>,
    pub age_ratings: BTreeSet<String>,
}

impl Preferences {
    /// Collect preferences from the `window` most recent interactions.
    pub fn from_history(
        history: &InteractionHistory,
        stats: &HashMap<BookId, &ItemStats>,
        window: usize,
    ) -> Self {
        let mut prefs = Self::default();
        for entry in history.recent(window) {
            let Some(item) = stats.get(&entry.book_id) else {
                continue;
            };
            if let Some(genre) = &item.genre {
                prefs.genres.insert(genre.clone());
            }
            if let Some(rating) = &item.age_rating {
                prefs.age_ratings.insert(rating.clone());
            }
        }
        prefs
    }
}

/// An empty preference set lets every age rating through.
fn age_rating_allowed(age_ratings: &BTreeSet<String>, item: &ItemStats) -> bool {
    age_ratings.is_empty()
        || item
            .age_rating
            .as_ref()
            .is_some_and(|r| age_ratings.contains(r))
}

/// Which items a stage considers.
#[derive(Debug, Clone, PartialEq)]
pub enum StageFilter {
    /// Genre among `genres`; age rating among `age_ratings` unless that set is empty.
    Affinity {
        genres: BTreeSet<String>,
        age_ratings: BTreeSet<String>,
    },
    /// Age rating among `age_ratings` unless that set is empty.
    AgeRating { age_ratings: BTreeSet<String> },
    /// At least `min_reviews` reviews.
    MinReviews { min_reviews: u32 },
}

impl StageFilter {
    fn matches(&self, item: &ItemStats) -> bool {
        match self {
            StageFilter::Affinity {
                genres,
                age_ratings,
            } => {
                item.genre.as_ref().is_some_and(|g| genres.contains(g))
                    && age_rating_allowed(age_ratings, item)
            }
            StageFilter::AgeRating { age_ratings } => age_rating_allowed(age_ratings, item),
            StageFilter::MinReviews { min_reviews } => item.review_count >= *min_reviews,
        }
    }
}

/// Ranking key for a stage. Every order ends with book id ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOrder {
    /// Popularity desc, then average rating desc with nulls last.
    Popularity,
    /// Average rating desc with nulls last, then review count desc.
    Rating,
}

/// Descending on present values; `None` sorts after every value.
pub(crate) fn rating_desc_nulls_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl StageOrder {
    fn compare(&self, a: &ItemStats, b: &ItemStats) -> Ordering {
        let primary = match self {
            StageOrder::Popularity => b
                .popularity
                .cmp(&a.popularity)
                .then_with(|| rating_desc_nulls_last(a.avg_rating, b.avg_rating)),
            StageOrder::Rating => rating_desc_nulls_last(a.avg_rating, b.avg_rating)
                .then_with(|| b.review_count.cmp(&a.review_count)),
        };
        primary.then_with(|| a.book_id.cmp(&b.book_id))
    }
}

/// One waterfall stage: filter, exclusion set, ordering and quota.
#[derive(Debug, Clone)]
pub struct StageQuery {
    pub stage: Stage,
    pub filter: StageFilter,
    pub exclude: HashSet<BookId>,
    pub order: StageOrder,
    pub limit: usize,
}

impl StageQuery {
    /// Ids of the top `limit` available, non-excluded items passing the filter.
    pub fn run(&self, items: &[ItemStats]) -> Vec<BookId> {
        if self.limit == 0 {
            return Vec::new();
        }
        let mut eligible: Vec<&ItemStats> = items
            .iter()
            .filter(|item| item.is_available())
            .filter(|item| !self.exclude.contains(&item.book_id))
            .filter(|item| self.filter.matches(item))
            .collect();
        eligible.sort_by(|a, b| self.order.compare(a, b));
        eligible
            .into_iter()
            .take(self.limit)
            .map(|item| item.book_id)
            .collect()
    }
}

/// Build and run the waterfall over precomputed item stats.
///
/// Returns `(book_id, stage)` pairs in final order; never more than `limit`,
/// never an id from the patron's history, never the same id twice.
pub fn compose(
    history: &InteractionHistory,
    items: &[ItemStats],
    limit: usize,
    config: &RecommendConfig,
) -> Vec<(BookId, Stage)> {
    let by_id: HashMap<BookId, &ItemStats> = items.iter().map(|i| (i.book_id, i)).collect();
    let prefs = Preferences::from_history(history, &by_id, config.history_window);
    let seen = history.exclusion_set();

    let mut chosen: Vec<(BookId, Stage)> = Vec::with_capacity(limit);
    let excluded = |chosen: &[(BookId, Stage)]| -> HashSet<BookId> {
        seen.iter()
            .copied()
            .chain(chosen.iter().map(|(id, _)| *id))
            .collect()
    };

    let mut stages = Vec::with_capacity(3);
    if !history.is_empty() {
        stages.push((
            Stage::Affinity,
            StageFilter::Affinity {
                genres: prefs.genres.clone(),
                age_ratings: prefs.age_ratings.clone(),
            },
            StageOrder::Popularity,
        ));
    }
    stages.push((
        Stage::Popular,
        StageFilter::AgeRating {
            age_ratings: prefs.age_ratings.clone(),
        },
        StageOrder::Popularity,
    ));
    stages.push((
        Stage::TopRated,
        StageFilter::MinReviews {
            min_reviews: config.min_review_count,
        },
        StageOrder::Rating,
    ));

    for (stage, filter, order) in stages {
        let remaining = limit.saturating_sub(chosen.len());
        if remaining == 0 {
            break;
        }
        let quota = match stage {
            Stage::Affinity => remaining.min(limit / 2),
            _ => remaining,
        };
        let query = StageQuery {
            stage,
            filter,
            exclude: excluded(&chosen),
            order,
            limit: quota,
        };
        let picked = query.run(items);
        debug!(stage = %stage, picked = picked.len(), quota, "Recommendation stage");
        chosen.extend(picked.into_iter().map(|id| (id, stage)));
    }

    chosen.truncate(limit);
    chosen
}

/// Recommendation entry point backed by the catalog store.
pub struct RecommendationService {
    store: Arc<dyn CatalogStore>,
    config: RecommendConfig,
}

impl RecommendationService {
    pub fn new(store: Arc<dyn CatalogStore>, config: RecommendConfig) -> Self {
        Self { store, config }
    }

    /// Recommend up to `limit` books (default from config) for a patron.
    ///
    /// Unknown patrons get an empty list.
    pub async fn recommend(
        &self,
        patron_id: PatronId,
        limit: Option<usize>,
    ) -> Result<Vec<Recommendation>, ShelfmarkError> {
        let limit = limit.unwrap_or(self.config.default_limit);
        if limit == 0 {
            return Err(ShelfmarkError::Validation(
                "limit must be positive".to_string(),
            ));
        }
        if !self.store.patron_exists(patron_id).await? {
            debug!(patron_id, "No patron record; nothing to recommend");
            return Ok(Vec::new());
        }

        let history = self.store.interaction_history(patron_id).await?;
        let items = self.store.item_stats().await?;
        let picks = compose(&history, &items, limit, &self.config);

        let stages: HashMap<BookId, Stage> = picks.iter().copied().collect();
        let ranked: Vec<(BookId, Option<f32>)> = picks.iter().map(|(id, _)| (*id, None)).collect();
        let summaries = load_summaries(self.store.as_ref(), &ranked).await?;

        Ok(summaries
            .into_iter()
            .filter_map(|hit| {
                stages.get(&hit.book.book_id).map(|stage| Recommendation {
                    stage: *stage,
                    book: hit.book,
                })
            })
            .collect())
    }
}
