use serde::{Deserialize, Serialize};

use crate::models::{CatalogItem, Patron, PatronInteraction, Review};

/// Serialized catalog contents, as accepted by `shelfmark load`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub books: Vec<CatalogItem>,
    #[serde(default)]
    pub patrons: Vec<Patron>,
    #[serde(default)]
    pub interactions: Vec<PatronInteraction>,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

impl CatalogSnapshot {
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
            && self.patrons.is_empty()
            && self.interactions.is_empty()
            && self.reviews.is_empty()
    }
}
