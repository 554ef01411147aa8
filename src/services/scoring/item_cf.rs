use super::{ScoreStrategy, ScoringContext};
use crate::models::{MovieId, ScoreSource, UserId};
use std::collections::HashMap;
use tracing::debug;

/// Item-based collaborative filtering.
///
/// For each movie the user rated, accumulate `similarity x rating` into every
/// positively-similar unrated movie; the predicted score is the accumulated
/// sum normalized by the accumulated similarity.
pub struct ItemCfStrategy;

impl ScoreStrategy for ItemCfStrategy {
    fn score(&self, user_id: UserId, ctx: &ScoringContext<'_>) -> HashMap<MovieId, f64> {
        let Some(rated) = ctx.ratings.ratings_of(user_id).filter(|r| !r.is_empty()) else {
            debug!("item-cf: user {} has no ratings, returning empty", user_id);
            return HashMap::new();
        };

        let mut weighted_sum: HashMap<MovieId, f64> = HashMap::new();
        let mut weight_total: HashMap<MovieId, f64> = HashMap::new();

        for (&seed_movie, &rating) in rated {
            for (candidate, similarity) in ctx.item_similarity.neighbors(seed_movie) {
                if similarity <= 0.0 || rated.contains_key(&candidate) {
                    continue;
                }
                *weighted_sum.entry(candidate).or_default() += similarity * rating;
                *weight_total.entry(candidate).or_default() += similarity;
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
            "item-cf: user {} scored {} candidates from {} seed movies",
            user_id,
            scores.len(),
            rated.len()
        );
        scores
    }

    fn source(&self) -> ScoreSource {
        ScoreSource::ItemCf
    }
}
