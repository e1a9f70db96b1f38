use serde::{Deserialize, Serialize};

/// Catalog identifier of a book (the store's integer key).
pub type BookId = i64;

fn default_role() -> String {
    "author".to_string()
}

fn default_true() -> bool {
    true
}

/// A person credited on a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub name: String,
    #[serde(default = "default_role")]
    pub role: String,
}

impl Contributor {
    pub fn author(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: default_role(),
        }
    }

    pub fn is_author(&self) -> bool {
        self.role.eq_ignore_ascii_case("author")
    }
}

/// Names of the author-role contributors, sorted alphabetically.
pub fn author_names(contributors: &[Contributor]) -> Vec<&str> {
    let mut names: Vec<&str> = contributors
        .iter()
        .filter(|c| c.is_author())
        .map(|c| c.name.as_str())
        .collect();
    names.sort_unstable();
    names
}

/// Book as exposed by the catalog store.
///
/// Owned and mutated by the catalog; read-only for discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub book_id: BookId,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub age_rating: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub sub_genre: Option<String>,
    #[serde(default)]
    pub contributors: Vec<Contributor>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub available_items: u32,
    #[serde(default)]
    pub total_items: u32,
}

impl CatalogItem {
    /// Create an active item with a single copy on the shelf.
    pub fn new(book_id: BookId, title: impl Into<String>) -> Self {
        Self {
            book_id,
            title: title.into(),
            subtitle: None,
            description: None,
            collection_name: None,
            age_rating: None,
            genre: None,
            sub_genre: None,
            contributors: Vec::new(),
            is_active: true,
            available_items: 1,
            total_items: 1,
        }
    }

    /// Author names sorted alphabetically.
    pub fn authors(&self) -> Vec<&str> {
        author_names(&self.contributors)
    }

    /// Active with at least one copy on the shelf.
    pub fn is_available(&self) -> bool {
        self.is_active && self.available_items > 0
    }
}

/// A single patron review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub book_id: BookId,
    pub patron_id: i64,
    pub rating: f64,
}

/// Average rating and review count for one book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingAggregate {
    pub avg_rating: Option<f64>,
    pub review_count: u32,
}

impl RatingAggregate {
    /// Aggregate a set of ratings; no ratings gives a null average.
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let (sum, count) = ratings
            .into_iter()
            .fold((0.0_f64, 0_u32), |(sum, count), r| (sum + r, count + 1));
        Self {
            avg_rating: (count > 0).then(|| sum / count as f64),
            review_count: count,
        }
    }
}

/// Display projection of a book: metadata joined with availability and ratings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSummary {
    pub book_id: BookId,
    pub title: String,
    pub subtitle: Option<String>,
    pub collection_name: Option<String>,
    pub age_rating: Option<String>,
    pub contributors: Vec<Contributor>,
    pub available_items: u32,
    pub total_items: u32,
    pub avg_rating: Option<f64>,
    pub review_count: u32,
}

impl BookSummary {
    pub fn from_item(item: &CatalogItem, rating: RatingAggregate) -> Self {
        Self {
            book_id: item.book_id,
            title: item.title.clone(),
            subtitle: item.subtitle.clone(),
            collection_name: item.collection_name.clone(),
            age_rating: item.age_rating.clone(),
            contributors: item.contributors.clone(),
            available_items: item.available_items,
            total_items: item.total_items,
            avg_rating: rating.avg_rating,
            review_count: rating.review_count,
        }
    }

    /// Comma-joined author names for display.
    pub fn author_line(&self) -> String {
        author_names(&self.contributors).join(", ")
    }
}
