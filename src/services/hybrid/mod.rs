//! Score fusion and final ranking.
//!
//! Each strategy's raw scores are min-max normalized over its own candidate
//! set before weighting, so no single filter dominates due to scale. Movies
//! missing from a set contribute 0 for that set's term. An empty candidate
//! union falls back to the caller-supplied popular list.

use crate::models::{CandidateSet, MovieId, RationaleTag, Recommendation, ScoreSource};
use crate::utils::{normalize_score, score_bounds};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

pub struct HybridRanker;

impl HybridRanker {
    /// Fuse candidate sets into the final ordered list.
    ///
    /// `exclude` holds already-rated and watchlisted movie ids; nothing in it
    /// ever appears in the output, fallback entries included. Returns the
    /// recommendations plus whether the popularity fallback was used.
    pub fn fuse(
        &self,
        sets: &[CandidateSet],
        exclude: &HashSet<MovieId>,
        popular_fallback: &[MovieId],
        limit: usize,
    ) -> (Vec<Recommendation>, bool) {
        let mut fused: BTreeMap<MovieId, (f64, Vec<ScoreSource>)> = BTreeMap::new();

        for set in sets {
            if set.weight <= 0.0 {
                continue;
            }
            let Some((min, max)) = score_bounds(set.scores.values()) else {
                continue;
            };
            for (&movie_id, &raw) in &set.scores {
                if exclude.contains(&movie_id) {
                    continue;
                }
                let normalized = normalize_score(raw, min, max);
                let entry = fused.entry(movie_id).or_insert((0.0, Vec::new()));
                entry.0 += set.weight * normalized;
                entry.1.push(set.source);
            }
        }

        if fused.is_empty() {
            warn!(
                "no personalized candidates, falling back to {} popular movies",
                popular_fallback.len()
            );
            return (self.fallback(popular_fallback, exclude, limit), true);
        }

        let mut recommendations: Vec<Recommendation> = fused
            .into_iter()
            .map(|(movie_id, (score, contributors))| Recommendation {
                movie_id,
                score,
                rationale: match contributors.as_slice() {
                    [single] => RationaleTag::from(*single),
                    _ => RationaleTag::Hybrid,
                },
            })
            .collect();

        // Descending score, movie id ascending on ties: deterministic output
        recommendations.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.movie_id.cmp(&b.movie_id))
        });
        recommendations.truncate(limit);

        (recommendations, false)
    }

    /// Caller-supplied popular list, order preserved, exclusions removed.
    /// Scores descend strictly so the list survives a score sort unchanged.
    fn fallback(
        &self,
        popular: &[MovieId],
        exclude: &HashSet<MovieId>,
        limit: usize,
    ) -> Vec<Recommendation> {
        let mut seen: HashSet<MovieId> = HashSet::new();
        let kept: Vec<MovieId> = popular
            .iter()
            .copied()
            .filter(|id| !exclude.contains(id) && seen.insert(*id))
            .take(limit)
            .collect();

        let n = kept.len();
        kept.into_iter()
            .enumerate()
            .map(|(i, movie_id)| Recommendation {
                movie_id,
                score: (n - i) as f64 / n as f64,
                rationale: RationaleTag::FallbackPopular,
            })
            .collect()
    }
}
