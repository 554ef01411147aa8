//! Pairwise similarity computation with a snapshot-versioned cache.
//!
//! Matrices are keyed by the snapshot fingerprint, so repeated requests
//! against an unchanged snapshot reuse the stored matrix. A cache miss under
//! concurrent first access computes once; all waiters share the result.

use crate::models::{MovieId, UserId};
use crate::snapshot::{FeatureMatrix, RatingMatrix};
use dashmap::DashMap;
use ndarray::Array1;
use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

/// Symmetric sparse similarity matrix.
///
/// Zero entries are not stored; self-similarity is implicit
/// (`get(a, a) == 1.0`).
#[derive(Debug, Clone, Default)]
pub struct SimilarityMatrix {
    adjacency: HashMap<u64, BTreeMap<u64, f64>>,
}

impl SimilarityMatrix {
    fn insert(&mut self, a: u64, b: u64, similarity: f64) {
        if a == b || similarity == 0.0 {
            return;
        }
        self.adjacency.entry(a).or_default().insert(b, similarity);
        self.adjacency.entry(b).or_default().insert(a, similarity);
    }

    pub fn get(&self, a: u64, b: u64) -> f64 {
        if a == b {
            return 1.0;
        }
        self.adjacency
            .get(&a)
            .and_then(|row| row.get(&b))
            .copied()
            .unwrap_or(0.0)
    }

    /// All stored neighbors of `id`, in ascending id order.
    pub fn neighbors(&self, id: u64) -> impl Iterator<Item = (u64, f64)> + '_ {
        self.adjacency
            .get(&id)
            .into_iter()
            .flat_map(|row| row.iter().map(|(&other, &sim)| (other, sim)))
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }
}

/// Cosine between two dense vectors; 0 when either norm is 0.
pub fn cosine_dense(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    let norm_a = a.dot(a).sqrt();
    let norm_b = b.dot(b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    a.dot(b) / (norm_a * norm_b)
}

/// Cosine between two sparse vectors; 0 when either norm is 0.
fn cosine_sparse(a: &BTreeMap<u64, f64>, b: &BTreeMap<u64, f64>) -> f64 {
    let norm_a = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b = b.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    // Iterate the smaller map, probe the larger
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(k, va)| large.get(k).map(|vb| va * vb))
        .sum();

    dot / (norm_a * norm_b)
}

fn pairwise_sparse(ids: &[u64], vectors: &HashMap<u64, BTreeMap<u64, f64>>) -> SimilarityMatrix {
    let mut matrix = SimilarityMatrix::default();
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            let sim = cosine_sparse(&vectors[&a], &vectors[&b]);
            matrix.insert(a, b, sim);
        }
    }
    matrix
}

/// User x user cosine over rating rows, optionally mean-centered per user.
pub fn compute_user_similarity(ratings: &RatingMatrix, mean_center: bool) -> SimilarityMatrix {
    let users = ratings.users();
    let mut rows: HashMap<UserId, BTreeMap<MovieId, f64>> = HashMap::with_capacity(users.len());

    for &user_id in &users {
        let mean = if mean_center {
            ratings.user_mean(user_id)
        } else {
            0.0
        };
        let row = ratings
            .ratings_of(user_id)
            .map(|row| row.iter().map(|(&m, &r)| (m, r - mean)).collect())
            .unwrap_or_default();
        rows.insert(user_id, row);
    }

    pairwise_sparse(&users, &rows)
}

/// Item x item cosine over rating columns (users as features).
pub fn compute_item_similarity(ratings: &RatingMatrix) -> SimilarityMatrix {
    let movies = ratings.movies();
    let mut columns: HashMap<MovieId, BTreeMap<UserId, f64>> =
        HashMap::with_capacity(movies.len());

    for &movie_id in &movies {
        let column = ratings.raters_of(movie_id).cloned().unwrap_or_default();
        columns.insert(movie_id, column);
    }

    pairwise_sparse(&movies, &columns)
}

/// Item x item cosine over genre feature vectors.
pub fn compute_content_similarity(features: &FeatureMatrix) -> SimilarityMatrix {
    let movies = features.movies();
    let mut matrix = SimilarityMatrix::default();

    for (i, &a) in movies.iter().enumerate() {
        for &b in &movies[i + 1..] {
            let sim = match (features.vector(a), features.vector(b)) {
                (Some(va), Some(vb)) => cosine_dense(va, vb),
                _ => 0.0,
            };
            matrix.insert(a, b, sim);
        }
    }
    matrix
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MatrixKind {
    User,
    Item,
    Content,
}

/// Caching façade over the similarity computations.
///
/// Single writer per key: the `OnceCell` inside each slot makes concurrent
/// first access compute exactly once while later readers share the `Arc`.
pub struct SimilarityIndex {
    mean_center_users: bool,
    cache: DashMap<(u64, MatrixKind), Arc<OnceCell<Arc<SimilarityMatrix>>>>,
}

impl SimilarityIndex {
    pub fn new(mean_center_users: bool) -> Self {
        Self {
            mean_center_users,
            cache: DashMap::new(),
        }
    }

    pub fn user_similarity(&self, ratings: &RatingMatrix) -> Arc<SimilarityMatrix> {
        let mean_center = self.mean_center_users;
        self.get_or_compute(ratings.fingerprint(), MatrixKind::User, || {
            compute_user_similarity(ratings, mean_center)
        })
    }

    pub fn item_similarity(&self, ratings: &RatingMatrix) -> Arc<SimilarityMatrix> {
        self.get_or_compute(ratings.fingerprint(), MatrixKind::Item, || {
            compute_item_similarity(ratings)
        })
    }

    pub fn content_similarity(&self, features: &FeatureMatrix) -> Arc<SimilarityMatrix> {
        self.get_or_compute(features.fingerprint(), MatrixKind::Content, || {
            compute_content_similarity(features)
        })
    }

    /// Drop cached matrices for snapshots other than the given fingerprints.
    /// Called by the engine when it observes a new snapshot version.
    pub fn retain_snapshots(&self, fingerprints: &[u64]) {
        self.cache
            .retain(|(fp, _), _| fingerprints.contains(fp));
    }

    pub fn cached_matrices(&self) -> usize {
        self.cache.len()
    }

    fn get_or_compute<F>(&self, fingerprint: u64, kind: MatrixKind, compute: F) -> Arc<SimilarityMatrix>
    where
        F: FnOnce() -> SimilarityMatrix,
    {
        // Clone the cell out before initializing so the shard lock is not
        // held across the computation.
        let cell = {
            let entry = self
                .cache
                .entry((fingerprint, kind))
                .or_insert_with(|| Arc::new(OnceCell::new()));
            Arc::clone(entry.value())
        };

        cell.get_or_init(|| {
            info!(
                "similarity cache miss: computing {:?} matrix for snapshot {:016x}",
                kind, fingerprint
            );
            Arc::new(compute())
        })
        .clone()
    }
}
