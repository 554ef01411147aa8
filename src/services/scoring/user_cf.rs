use super::{ScoreStrategy, ScoringContext};
use crate::models::{MovieId, ScoreSource, UserId};
use std::collections::HashMap;
use tracing::debug;

/// User-based collaborative filtering.
///
/// Algorithm:
/// 1. Select the top-K most similar users (excluding self, excluding
///    similarity <= 0; ties broken by user id ascending)
/// 2. Predict each unrated movie as the similarity-weighted average of the
///    neighbors' ratings for it
///
/// Fewer than K positive neighbors: use what exists. Zero neighbors or zero
/// ratings: empty set, the cold-start trigger.
pub struct UserCfStrategy;

impl ScoreStrategy for UserCfStrategy {
    fn score(&self, user_id: UserId, ctx: &ScoringContext<'_>) -> HashMap<MovieId, f64> {
        let Some(rated) = ctx.ratings.ratings_of(user_id).filter(|r| !r.is_empty()) else {
            debug!("user-cf: user {} has no ratings, returning empty", user_id);
            return HashMap::new();
        };

        let mut neighbors: Vec<(UserId, f64)> = ctx
            .user_similarity
            .neighbors(user_id)
            .filter(|&(other, sim)| other != user_id && sim > 0.0)
            .collect();

        neighbors.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        neighbors.truncate(ctx.top_k_neighbors);

        if neighbors.is_empty() {
            debug!("user-cf: user {} has no positive neighbors", user_id);
            return HashMap::new();
        }

        let mut weighted_sum: HashMap<MovieId, f64> = HashMap::new();
        let mut weight_total: HashMap<MovieId, f64> = HashMap::new();

        for &(neighbor_id, similarity) in &neighbors {
            let Some(neighbor_ratings) = ctx.ratings.ratings_of(neighbor_id) else {
                continue;
            };
            for (&movie_id, &rating) in neighbor_ratings {
                if rated.contains_key(&movie_id) {
                    continue;
                }
                *weighted_sum.entry(movie_id).or_default() += similarity * rating;
                *weight_total.entry(movie_id).or_default() += similarity;
            }
        }

        let scores: HashMap<MovieId, f64> = weighted_sum
            .into_iter()
            .filter_map(|(movie_id, sum)| {
                let total = weight_total.get(&movie_id).copied().unwrap_or(0.0);
                (total > 0.0).then(|| (movie_id, sum / total))
            })
            .collect();

        debug!(
            "user-cf: user {} scored {} candidates from {} neighbors",
            user_id,
            scores.len(),
            neighbors.len()
        );
        scores
    }

    fn source(&self) -> ScoreSource {
        ScoreSource::UserCf
    }
}
