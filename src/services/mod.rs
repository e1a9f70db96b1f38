pub mod recommend;
pub mod search;
pub mod similar;

pub use recommend::{
    compose, Preferences, Recommendation, RecommendationService, Stage, StageFilter, StageOrder,
    StageQuery,
};
pub use search::{
    DiscoveryService, KeywordRetriever, RankedBook, SearchMode, SearchResponse, VectorRetriever,
};
pub use similar::{similarity_tier, SimilarBook, SimilarService};
