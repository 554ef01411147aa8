use crate::models::{MovieId, UserId, RATING_MAX, RATING_MIN};
use thiserror::Error;

/// Errors surfaced to the caller.
///
/// Cold start and empty snapshots are not errors: they degrade to the
/// popularity fallback inside the ranker.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid rating {rating} for user {user_id} on movie {movie_id} (expected {RATING_MIN}..={RATING_MAX})")]
    InvalidRating {
        user_id: UserId,
        movie_id: MovieId,
        rating: f64,
    },

    #[error("unknown user {0}")]
    UnknownUser(UserId),

    #[error("unknown movie {0}")]
    UnknownMovie(MovieId),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}
