//! Candidate scoring strategies.
//!
//! Each strategy reads the immutable snapshot context and produces raw
//! per-movie scores for one user; the hybrid ranker normalizes and fuses
//! them. Strategies never fabricate scores: a user without usable signal
//! yields an empty set, which is the ranker's cold-start trigger.

mod content;
mod item_cf;
mod user_cf;

use crate::models::{MovieId, ScoreSource, UserId};
use crate::services::similarity::SimilarityMatrix;
use crate::snapshot::{FeatureMatrix, RatingMatrix};
use std::collections::HashMap;

pub use content::ContentStrategy;
pub use item_cf::ItemCfStrategy;
pub use user_cf::UserCfStrategy;

/// Everything a strategy may read for one request.
pub struct ScoringContext<'a> {
    pub ratings: &'a RatingMatrix,
    pub features: &'a FeatureMatrix,
    pub user_similarity: &'a SimilarityMatrix,
    pub item_similarity: &'a SimilarityMatrix,
    /// Explicit genre preference supplied by the caller, used by the content
    /// strategy when the user has no rating history.
    pub genre_preference: Option<&'a [String]>,
    pub top_k_neighbors: usize,
}

pub trait ScoreStrategy: Send + Sync {
    /// Raw candidate scores for movies the user has not rated.
    fn score(&self, user_id: UserId, ctx: &ScoringContext<'_>) -> HashMap<MovieId, f64>;

    fn source(&self) -> ScoreSource;
}

/// The closed set of strategies, in fusion order.
pub fn default_strategies() -> Vec<Box<dyn ScoreStrategy>> {
    vec![
        Box::new(UserCfStrategy),
        Box::new(ItemCfStrategy),
        Box::new(ContentStrategy),
    ]
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::{MovieMetadata, RatingEvent};
    use crate::services::similarity::{
        compute_content_similarity, compute_item_similarity, compute_user_similarity,
    };
    use std::collections::HashSet;

    pub struct Fixture {
        pub ratings: RatingMatrix,
        pub features: FeatureMatrix,
        pub user_similarity: SimilarityMatrix,
        pub item_similarity: SimilarityMatrix,
        pub content_similarity: SimilarityMatrix,
    }

    impl Fixture {
        pub fn new(
            events: &[(UserId, MovieId, f64)],
            movies: &[(MovieId, &[&str])],
            mean_center: bool,
        ) -> Self {
            let events: Vec<RatingEvent> = events
                .iter()
                .map(|&(u, m, r)| RatingEvent::new(u, m, r))
                .collect();
            let metadata: Vec<MovieMetadata> = movies
                .iter()
                .map(|&(movie_id, genres)| MovieMetadata {
                    movie_id,
                    genres: genres.iter().map(|g| g.to_string()).collect::<HashSet<_>>(),
                })
                .collect();

            let ratings = RatingMatrix::from_events(&events).unwrap();
            let features = FeatureMatrix::from_metadata(&metadata);
            let user_similarity = compute_user_similarity(&ratings, mean_center);
            let item_similarity = compute_item_similarity(&ratings);
            let content_similarity = compute_content_similarity(&features);

            Self {
                ratings,
                features,
                user_similarity,
                item_similarity,
                content_similarity,
            }
        }

        pub fn context(&self, top_k: usize) -> ScoringContext<'_> {
            ScoringContext {
                ratings: &self.ratings,
                features: &self.features,
                user_similarity: &self.user_similarity,
                item_similarity: &self.item_similarity,
                genre_preference: None,
                top_k_neighbors: top_k,
            }
        }
    }
}
