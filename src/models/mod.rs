use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub type UserId = u64;
pub type MovieId = u64;

/// Valid rating range (half-point granularity, TMDB-style 0.5..=5.0 scale).
pub const RATING_MIN: f64 = 0.5;
pub const RATING_MAX: f64 = 5.0;

/// One rating observation supplied by the rating store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingEvent {
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub rating: f64,
    pub rated_at: Option<DateTime<Utc>>,
}

impl RatingEvent {
    pub fn new(user_id: UserId, movie_id: MovieId, rating: f64) -> Self {
        Self {
            user_id,
            movie_id,
            rating,
            rated_at: None,
        }
    }
}

/// Per-movie metadata supplied by the metadata store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieMetadata {
    pub movie_id: MovieId,
    pub genres: HashSet<String>,
}

/// Which scoring strategy produced a candidate score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreSource {
    UserCf,
    ItemCf,
    Content,
}

impl ScoreSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreSource::UserCf => "user_cf",
            ScoreSource::ItemCf => "item_cf",
            ScoreSource::Content => "content",
        }
    }
}

/// Why a movie ended up in the final list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RationaleTag {
    UserCf,
    ItemCf,
    Content,
    Hybrid,
    FallbackPopular,
}

impl RationaleTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RationaleTag::UserCf => "user_cf",
            RationaleTag::ItemCf => "item_cf",
            RationaleTag::Content => "content",
            RationaleTag::Hybrid => "hybrid",
            RationaleTag::FallbackPopular => "fallback_popular",
        }
    }
}

impl From<ScoreSource> for RationaleTag {
    fn from(source: ScoreSource) -> Self {
        match source {
            ScoreSource::UserCf => RationaleTag::UserCf,
            ScoreSource::ItemCf => RationaleTag::ItemCf,
            ScoreSource::Content => RationaleTag::Content,
        }
    }
}

/// One strategy's raw candidate scores plus its fusion weight.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    pub source: ScoreSource,
    pub weight: f64,
    pub scores: HashMap<MovieId, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub movie_id: MovieId,
    pub score: f64,
    pub rationale: RationaleTag,
}

/// Per-request scoring statistics, logged by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreStats {
    pub user_cf_count: usize,
    pub item_cf_count: usize,
    pub content_count: usize,
    pub total_candidates: usize,
    pub final_count: usize,
    pub fallback_used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub user_id: UserId,
    pub recommendations: Vec<Recommendation>,
    pub stats: ScoreStats,
}
