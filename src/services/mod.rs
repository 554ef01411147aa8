pub mod engine;
pub mod hybrid;
pub mod scoring;
pub mod similarity;

pub use engine::{MetadataStore, RatingStore, RecommendRequest, RecommendationEngine};
pub use hybrid::HybridRanker;
pub use similarity::{SimilarityIndex, SimilarityMatrix};
