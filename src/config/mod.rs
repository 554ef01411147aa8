use crate::error::EngineError;
use serde::Deserialize;
use std::env;

/// Fusion weights for the three scoring strategies.
///
/// Weights are normalized to sum to 1 before fusion so final scores stay
/// comparable in [0, 1].
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FusionWeights {
    pub user_cf: f64,
    pub item_cf: f64,
    pub content: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            user_cf: 0.5,
            item_cf: 0.3,
            content: 0.2,
        }
    }
}

impl FusionWeights {
    /// Normalize to sum 1. Negative components or a non-positive sum cannot
    /// be normalized and are rejected.
    pub fn normalized(self) -> Result<Self, EngineError> {
        if self.user_cf < 0.0 || self.item_cf < 0.0 || self.content < 0.0 {
            return Err(EngineError::Configuration(format!(
                "fusion weights must be non-negative, got {self:?}"
            )));
        }
        let sum = self.user_cf + self.item_cf + self.content;
        if sum <= f64::EPSILON {
            return Err(EngineError::Configuration(
                "fusion weights sum to zero and cannot be normalized".into(),
            ));
        }
        Ok(Self {
            user_cf: self.user_cf / sum,
            item_cf: self.item_cf / sum,
            content: self.content / sum,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Neighborhood size for user-based CF.
    pub top_k_neighbors: usize,
    pub weights: FusionWeights,
    /// Result length when the request does not specify one.
    pub default_limit: usize,
    pub exclude_already_rated: bool,
    /// Subtract each user's mean rating before user-user cosine.
    pub mean_center_users: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_k_neighbors: 20,
            weights: FusionWeights::default(),
            default_limit: 20,
            exclude_already_rated: true,
            mean_center_users: true,
        }
    }
}

impl EngineConfig {
    /// Load from environment variables, falling back to defaults per field.
    pub fn from_env() -> Result<Self, EngineError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Ok(Self {
            top_k_neighbors: parse_var("RECS_TOP_K_NEIGHBORS", defaults.top_k_neighbors)?,
            weights: FusionWeights {
                user_cf: parse_var("RECS_USER_CF_WEIGHT", defaults.weights.user_cf)?,
                item_cf: parse_var("RECS_ITEM_CF_WEIGHT", defaults.weights.item_cf)?,
                content: parse_var("RECS_CONTENT_WEIGHT", defaults.weights.content)?,
            },
            default_limit: parse_var("RECS_DEFAULT_LIMIT", defaults.default_limit)?,
            exclude_already_rated: parse_var("RECS_EXCLUDE_RATED", defaults.exclude_already_rated)?,
            mean_center_users: parse_var("RECS_MEAN_CENTER", defaults.mean_center_users)?,
        })
    }

    /// Reject values the algorithms cannot work with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.top_k_neighbors == 0 {
            return Err(EngineError::Configuration(
                "top_k_neighbors must be at least 1".into(),
            ));
        }
        if self.default_limit == 0 {
            return Err(EngineError::Configuration(
                "default_limit must be at least 1".into(),
            ));
        }
        self.weights.normalized().map(|_| ())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, EngineError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| EngineError::Configuration(format!("{name} has invalid value {raw:?}"))),
        Err(_) => Ok(default),
    }
}
