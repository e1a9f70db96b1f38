pub mod book;
pub mod embedding;
pub mod interaction;
pub mod snapshot;
pub mod stats;

pub use book::{BookId, BookSummary, CatalogItem, Contributor, RatingAggregate, Review};
pub use embedding::{EmbeddingCoverage, EmbeddingRecord};
pub use interaction::{
    Interaction, InteractionHistory, InteractionKind, Patron, PatronId, PatronInteraction,
};
pub use snapshot::CatalogSnapshot;
pub use stats::{rating_aggregates, ItemStats};
