//! The public façade: snapshot orchestration, cache lifecycle, fusion.

use crate::config::{EngineConfig, FusionWeights};
use crate::error::EngineError;
use crate::models::{
    CandidateSet, MovieId, MovieMetadata, RatingEvent, RationaleTag, Recommendation,
    RecommendationResult, ScoreSource, ScoreStats, UserId,
};
use crate::services::hybrid::HybridRanker;
use crate::services::scoring::{default_strategies, ScoreStrategy, ScoringContext};
use crate::services::similarity::SimilarityIndex;
use crate::snapshot::{FeatureMatrix, RatingMatrix};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Read-only source of rating triples. The engine never writes back.
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Full rating snapshot, one event per observation.
    async fn rating_events(&self) -> Result<Vec<RatingEvent>>;

    /// Whether the store recognizes the user at all. A recognized user with
    /// no ratings is a cold-start case, not an error.
    async fn user_exists(&self, user_id: UserId) -> Result<bool>;
}

/// Read-only source of per-movie genre metadata.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn movie_metadata(&self) -> Result<Vec<MovieMetadata>>;
}

/// One recommendation request. Unset options fall back to engine config.
#[derive(Debug, Clone, Default)]
pub struct RecommendRequest {
    pub user_id: UserId,
    pub limit: Option<usize>,
    pub weights: Option<FusionWeights>,
    /// Watchlisted or otherwise caller-excluded movie ids.
    pub exclude: HashSet<MovieId>,
    /// Explicit genre preference for users with no rating history.
    pub genre_preference: Option<Vec<String>>,
    /// Ordered popular list used only on cold start.
    pub popular_fallback: Vec<MovieId>,
    pub exclude_already_rated: Option<bool>,
}

impl RecommendRequest {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }
}

pub struct RecommendationEngine {
    rating_store: Arc<dyn RatingStore>,
    metadata_store: Arc<dyn MetadataStore>,
    similarity: SimilarityIndex,
    strategies: Vec<Box<dyn ScoreStrategy>>,
    ranker: HybridRanker,
    config: EngineConfig,
}

impl RecommendationEngine {
    pub fn new(
        rating_store: Arc<dyn RatingStore>,
        metadata_store: Arc<dyn MetadataStore>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            rating_store,
            metadata_store,
            similarity: SimilarityIndex::new(config.mean_center_users),
            strategies: default_strategies(),
            ranker: HybridRanker,
            config,
        })
    }

    /// Produce a ranked recommendation list for one user.
    ///
    /// Stateless across calls except for the similarity cache: repeated calls
    /// against an unchanged snapshot reuse the cached matrices and yield
    /// identical ordered results.
    pub async fn recommend(
        &self,
        request: RecommendRequest,
    ) -> Result<RecommendationResult, EngineError> {
        let limit = request.limit.unwrap_or(self.config.default_limit);
        if limit == 0 {
            return Err(EngineError::Configuration(
                "limit must be at least 1".into(),
            ));
        }
        let weights = request.weights.unwrap_or(self.config.weights).normalized()?;

        if !self.rating_store.user_exists(request.user_id).await? {
            return Err(EngineError::UnknownUser(request.user_id));
        }

        let events = self.rating_store.rating_events().await?;
        let metadata = self.metadata_store.movie_metadata().await?;
        if events.is_empty() {
            warn!("rating snapshot is empty, personalization unavailable");
        }
        if metadata.is_empty() {
            warn!("metadata snapshot is empty, content scoring unavailable");
        }

        let ratings = RatingMatrix::from_events(&events)?;
        let features = FeatureMatrix::from_metadata(&metadata);

        // New snapshot version supersedes older cached matrices
        self.similarity
            .retain_snapshots(&[ratings.fingerprint(), features.fingerprint()]);
        let user_similarity = self.similarity.user_similarity(&ratings);
        let item_similarity = self.similarity.item_similarity(&ratings);

        let ctx = ScoringContext {
            ratings: &ratings,
            features: &features,
            user_similarity: &user_similarity,
            item_similarity: &item_similarity,
            genre_preference: request.genre_preference.as_deref(),
            top_k_neighbors: self.config.top_k_neighbors,
        };

        let mut stats = ScoreStats::default();
        let mut union: HashSet<MovieId> = HashSet::new();
        let mut sets: Vec<CandidateSet> = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let scores = strategy.score(request.user_id, &ctx);
            union.extend(scores.keys().copied());

            let source = strategy.source();
            let weight = match source {
                ScoreSource::UserCf => weights.user_cf,
                ScoreSource::ItemCf => weights.item_cf,
                ScoreSource::Content => weights.content,
            };
            match source {
                ScoreSource::UserCf => stats.user_cf_count = scores.len(),
                ScoreSource::ItemCf => stats.item_cf_count = scores.len(),
                ScoreSource::Content => stats.content_count = scores.len(),
            }
            sets.push(CandidateSet {
                source,
                weight,
                scores,
            });
        }
        stats.total_candidates = union.len();

        let mut exclusions = request.exclude;
        if request
            .exclude_already_rated
            .unwrap_or(self.config.exclude_already_rated)
        {
            if let Some(rated) = ratings.ratings_of(request.user_id) {
                exclusions.extend(rated.keys().copied());
            }
        }

        let (recommendations, fallback_used) =
            self.ranker
                .fuse(&sets, &exclusions, &request.popular_fallback, limit);
        stats.final_count = recommendations.len();
        stats.fallback_used = fallback_used;

        info!(
            "recommend: user={} user_cf={} item_cf={} content={} total={} final={} fallback={}",
            request.user_id,
            stats.user_cf_count,
            stats.item_cf_count,
            stats.content_count,
            stats.total_candidates,
            stats.final_count,
            stats.fallback_used
        );

        Ok(RecommendationResult {
            user_id: request.user_id,
            recommendations,
            stats,
        })
    }

    /// Movies most similar to the given movie by genre content, ranked by
    /// cosine similarity.
    pub async fn similar_movies(
        &self,
        movie_id: MovieId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, EngineError> {
        if limit == 0 {
            return Err(EngineError::Configuration(
                "limit must be at least 1".into(),
            ));
        }

        let metadata = self.metadata_store.movie_metadata().await?;
        let features = FeatureMatrix::from_metadata(&metadata);
        if !features.contains(movie_id) {
            return Err(EngineError::UnknownMovie(movie_id));
        }

        let content = self.similarity.content_similarity(&features);
        let mut similar: Vec<Recommendation> = content
            .neighbors(movie_id)
            .filter(|&(_, similarity)| similarity > 0.0)
            .map(|(other, similarity)| Recommendation {
                movie_id: other,
                score: similarity.clamp(0.0, 1.0),
                rationale: RationaleTag::Content,
            })
            .collect();

        similar.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.movie_id.cmp(&b.movie_id))
        });
        similar.truncate(limit);

        Ok(similar)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct InMemoryRatingStore {
        users: HashSet<UserId>,
        events: Vec<RatingEvent>,
    }

    #[async_trait]
    impl RatingStore for InMemoryRatingStore {
        async fn rating_events(&self) -> Result<Vec<RatingEvent>> {
            Ok(self.events.clone())
        }

        async fn user_exists(&self, user_id: UserId) -> Result<bool> {
            Ok(self.users.contains(&user_id))
        }
    }

    struct InMemoryMetadataStore {
        movies: Vec<MovieMetadata>,
    }

    #[async_trait]
    impl MetadataStore for InMemoryMetadataStore {
        async fn movie_metadata(&self) -> Result<Vec<MovieMetadata>> {
            Ok(self.movies.clone())
        }
    }

    fn engine(
        users: &[UserId],
        events: &[(UserId, MovieId, f64)],
        movies: &[(MovieId, &[&str])],
    ) -> RecommendationEngine {
        let rating_store = Arc::new(InMemoryRatingStore {
            users: users.iter().copied().collect(),
            events: events
                .iter()
                .map(|&(u, m, r)| RatingEvent::new(u, m, r))
                .collect(),
        });
        let metadata_store = Arc::new(InMemoryMetadataStore {
            movies: movies
                .iter()
                .map(|&(movie_id, genres)| MovieMetadata {
                    movie_id,
                    genres: genres.iter().map(|g| g.to_string()).collect(),
                })
                .collect(),
        });
        RecommendationEngine::new(rating_store, metadata_store, EngineConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_user_is_rejected() {
        let engine = engine(&[1], &[(1, 10, 4.0)], &[(10, &["Action"])]);
        let err = engine
            .recommend(RecommendRequest::for_user(99))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownUser(99)));
    }

    #[tokio::test]
    async fn test_invalid_rating_surfaces_as_error() {
        let engine = engine(&[1], &[(1, 10, 7.0)], &[]);
        let err = engine
            .recommend(RecommendRequest::for_user(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidRating { .. }));
    }

    #[tokio::test]
    async fn test_zero_limit_is_rejected() {
        let engine = engine(&[1], &[(1, 10, 4.0)], &[]);
        let mut request = RecommendRequest::for_user(1);
        request.limit = Some(0);
        assert!(matches!(
            engine.recommend(request).await,
            Err(EngineError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_snapshot_degrades_to_fallback() {
        let engine = engine(&[1], &[], &[]);
        let mut request = RecommendRequest::for_user(1);
        request.popular_fallback = vec![5, 6, 7];

        let result = engine.recommend(request).await.unwrap();
        assert!(result.stats.fallback_used);
        let ids: Vec<MovieId> = result.recommendations.iter().map(|r| r.movie_id).collect();
        assert_eq!(ids, vec![5, 6, 7]);
        assert!(result
            .recommendations
            .iter()
            .all(|r| r.rationale == RationaleTag::FallbackPopular));
    }

    #[tokio::test]
    async fn test_similar_movies_by_genre() {
        let engine = engine(
            &[1],
            &[],
            &[
                (1, &["Action", "Comedy"]),
                (2, &["Action", "Comedy"]),
                (3, &["Action"]),
                (4, &["Drama"]),
            ],
        );

        let similar = engine.similar_movies(1, 10).await.unwrap();
        let ids: Vec<MovieId> = similar.iter().map(|r| r.movie_id).collect();
        // Identical tags first, overlapping second, disjoint omitted
        assert_eq!(ids, vec![2, 3]);
        assert!((similar[0].score - 1.0).abs() < 1e-9);
        assert!(similar.iter().all(|r| r.rationale == RationaleTag::Content));
    }

    #[tokio::test]
    async fn test_similar_movies_unknown_movie() {
        let engine = engine(&[1], &[], &[(1, &["Action"])]);
        assert!(matches!(
            engine.similar_movies(42, 5).await,
            Err(EngineError::UnknownMovie(42))
        ));
    }
}
