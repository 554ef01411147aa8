//! Hybrid movie recommendation engine.
//!
//! Converts a sparse user x movie rating matrix and per-movie genre metadata
//! into ranked recommendation lists: user-based and item-based collaborative
//! filtering plus content-based genre scoring, fused into one hybrid score
//! with a popularity fallback for cold-start users.
//!
//! The surrounding application supplies ratings and metadata through the
//! [`RatingStore`] and [`MetadataStore`] traits and consumes a
//! [`models::RecommendationResult`]; everything in between is in-process
//! computation with a snapshot-versioned similarity cache.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod snapshot;
pub mod utils;

pub use config::{EngineConfig, FusionWeights};
pub use error::EngineError;
pub use services::{MetadataStore, RatingStore, RecommendRequest, RecommendationEngine};
