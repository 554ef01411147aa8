use super::{ScoreStrategy, ScoringContext};
use crate::models::{MovieId, ScoreSource, UserId};
use crate::services::similarity::cosine_dense;
use ndarray::Array1;
use std::collections::HashMap;
use tracing::debug;

/// Content-based filtering over genre vectors.
///
/// The user profile is the rating-weighted centroid of the genre vectors of
/// the movies the user rated; every unrated movie is scored by cosine to the
/// profile. A user with no ratings falls back to an explicit genre
/// preference when the caller supplied one, otherwise yields an empty set.
pub struct ContentStrategy;

impl ContentStrategy {
    fn profile(&self, user_id: UserId, ctx: &ScoringContext<'_>) -> Option<Array1<f64>> {
        if ctx.features.vocabulary_len() == 0 {
            return None;
        }

        if let Some(rated) = ctx.ratings.ratings_of(user_id).filter(|r| !r.is_empty()) {
            let mut centroid = Array1::<f64>::zeros(ctx.features.vocabulary_len());
            let mut rating_total = 0.0;
            for (&movie_id, &rating) in rated {
                if let Some(vector) = ctx.features.vector(movie_id) {
                    centroid = centroid + vector * rating;
                    rating_total += rating;
                }
            }
            if rating_total > 0.0 {
                return Some(centroid / rating_total);
            }
        }

        ctx.genre_preference
            .filter(|genres| !genres.is_empty())
            .map(|genres| ctx.features.vector_for_genres(genres))
    }
}

impl ScoreStrategy for ContentStrategy {
    fn score(&self, user_id: UserId, ctx: &ScoringContext<'_>) -> HashMap<MovieId, f64> {
        let Some(profile) = self.profile(user_id, ctx) else {
            debug!(
                "content: user {} has no ratings and no genre preference, returning empty",
                user_id
            );
            return HashMap::new();
        };

        let mut scores: HashMap<MovieId, f64> = HashMap::new();
        for movie_id in ctx.features.movies() {
            if ctx.ratings.has_rated(user_id, movie_id) {
                continue;
            }
            if let Some(vector) = ctx.features.vector(movie_id) {
                let similarity = cosine_dense(&profile, vector);
                if similarity > 0.0 {
                    scores.insert(movie_id, similarity);
                }
            }
        }

        debug!(
            "content: user {} scored {} candidates over a {}-genre vocabulary",
            user_id,
            scores.len(),
            ctx.features.vocabulary_len()
        );
        scores
    }

    fn source(&self) -> ScoreSource {
        ScoreSource::Content
    }
}
