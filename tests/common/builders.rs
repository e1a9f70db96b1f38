//! Test data builders for catalog construction.
//!
//! Provides fluent API for creating test books with sensible defaults.

use chrono::{Duration, TimeZone, Utc};

use shelfmark::models::{
    BookId, CatalogItem, Contributor, InteractionKind, PatronId, PatronInteraction, Review,
};

/// Builder for creating test books.
pub struct BookBuilder {
    item: CatalogItem,
}

impl BookBuilder {
    /// An active book with one copy on the shelf.
    pub fn new(book_id: BookId, title: impl Into<String>) -> Self {
        let mut item = CatalogItem::new(book_id, title);
        item.total_items = 1;
        item.available_items = 1;
        Self { item }
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.item.subtitle = Some(subtitle.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.item.description = Some(description.into());
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.item.genre = Some(genre.into());
        self
    }

    pub fn sub_genre(mut self, sub_genre: impl Into<String>) -> Self {
        self.item.sub_genre = Some(sub_genre.into());
        self
    }

    pub fn age_rating(mut self, age_rating: impl Into<String>) -> Self {
        self.item.age_rating = Some(age_rating.into());
        self
    }

    pub fn author(mut self, name: impl Into<String>) -> Self {
        self.item.contributors.push(Contributor::author(name));
        self
    }

    pub fn illustrator(mut self, name: impl Into<String>) -> Self {
        self.item.contributors.push(Contributor {
            name: name.into(),
            role: "illustrator".to_string(),
        });
        self
    }

    /// Set available and total copies.
    pub fn copies(mut self, available: u32, total: u32) -> Self {
        self.item.available_items = available;
        self.item.total_items = total;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.item.is_active = false;
        self
    }

    pub fn build(self) -> CatalogItem {
        self.item
    }
}

/// A borrow `days_ago` days before a fixed reference date.
pub fn interaction(patron_id: PatronId, book_id: BookId, days_ago: i64) -> PatronInteraction {
    let reference = Utc
        .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .expect("valid reference date");
    PatronInteraction {
        patron_id,
        book_id,
        kind: InteractionKind::Borrow,
        occurred_at: reference - Duration::days(days_ago),
    }
}

pub fn review(book_id: BookId, patron_id: PatronId, rating: f64) -> Review {
    Review {
        book_id,
        patron_id,
        rating,
    }
}
