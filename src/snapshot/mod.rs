//! Immutable per-request snapshots of the rating and metadata stores.
//!
//! The engine builds these once per `recommend` call; all scoring reads them
//! without touching the external stores again, so a concurrent store update
//! can never be observed mid-computation. Each snapshot carries an
//! order-independent fingerprint used as the similarity cache key.

use crate::error::EngineError;
use crate::models::{MovieId, MovieMetadata, RatingEvent, UserId, RATING_MAX, RATING_MIN};
use chrono::{DateTime, Utc};
use ndarray::Array1;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

/// Sparse user x movie rating matrix, indexed both ways.
///
/// Absence of an entry means "unrated", never zero.
#[derive(Debug, Clone)]
pub struct RatingMatrix {
    by_user: HashMap<UserId, BTreeMap<MovieId, f64>>,
    by_movie: HashMap<MovieId, BTreeMap<UserId, f64>>,
    fingerprint: u64,
}

impl RatingMatrix {
    /// Build from raw rating events.
    ///
    /// Ratings outside the valid range are rejected. Duplicate
    /// `(user, movie)` pairs resolve to the most recent event (by timestamp
    /// when present, otherwise last-seen), keeping at most one rating per
    /// pair.
    pub fn from_events(events: &[RatingEvent]) -> Result<Self, EngineError> {
        let mut latest: HashMap<(UserId, MovieId), (f64, Option<DateTime<Utc>>)> = HashMap::new();

        for event in events {
            if !(RATING_MIN..=RATING_MAX).contains(&event.rating) {
                return Err(EngineError::InvalidRating {
                    user_id: event.user_id,
                    movie_id: event.movie_id,
                    rating: event.rating,
                });
            }

            let key = (event.user_id, event.movie_id);
            match latest.get(&key) {
                Some((_, Some(existing_ts)))
                    if event.rated_at.is_some_and(|ts| ts < *existing_ts) => {}
                _ => {
                    latest.insert(key, (event.rating, event.rated_at));
                }
            }
        }

        let mut by_user: HashMap<UserId, BTreeMap<MovieId, f64>> = HashMap::new();
        let mut by_movie: HashMap<MovieId, BTreeMap<UserId, f64>> = HashMap::new();
        let mut fingerprint = (latest.len() as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);

        for (&(user_id, movie_id), &(rating, _)) in &latest {
            by_user.entry(user_id).or_default().insert(movie_id, rating);
            by_movie.entry(movie_id).or_default().insert(user_id, rating);

            let mut hasher = DefaultHasher::new();
            (user_id, movie_id, rating.to_bits()).hash(&mut hasher);
            // Commutative mix keeps the fingerprint independent of input order
            fingerprint = fingerprint.wrapping_add(hasher.finish());
        }

        Ok(Self {
            by_user,
            by_movie,
            fingerprint,
        })
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }

    pub fn num_users(&self) -> usize {
        self.by_user.len()
    }

    pub fn num_movies(&self) -> usize {
        self.by_movie.len()
    }

    /// User ids in ascending order.
    pub fn users(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.by_user.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Movie ids in ascending order.
    pub fn movies(&self) -> Vec<MovieId> {
        let mut ids: Vec<MovieId> = self.by_movie.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// The row for one user: movie -> rating.
    pub fn ratings_of(&self, user_id: UserId) -> Option<&BTreeMap<MovieId, f64>> {
        self.by_user.get(&user_id)
    }

    /// The column for one movie: user -> rating.
    pub fn raters_of(&self, movie_id: MovieId) -> Option<&BTreeMap<UserId, f64>> {
        self.by_movie.get(&movie_id)
    }

    pub fn has_rated(&self, user_id: UserId, movie_id: MovieId) -> bool {
        self.by_user
            .get(&user_id)
            .is_some_and(|row| row.contains_key(&movie_id))
    }

    /// Mean of the user's rated entries (0.0 for a user with no ratings).
    pub fn user_mean(&self, user_id: UserId) -> f64 {
        match self.by_user.get(&user_id) {
            Some(row) if !row.is_empty() => {
                row.values().sum::<f64>() / row.len() as f64
            }
            _ => 0.0,
        }
    }
}

/// Closed genre vocabulary plus one binary feature vector per movie.
///
/// The vocabulary is the sorted union of all genre tags present in the
/// metadata snapshot; every vector has vocabulary length.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    vocabulary: Vec<String>,
    index: HashMap<String, usize>,
    vectors: HashMap<MovieId, Array1<f64>>,
    fingerprint: u64,
}

impl FeatureMatrix {
    pub fn from_metadata(movies: &[MovieMetadata]) -> Self {
        let mut vocabulary: Vec<String> = movies
            .iter()
            .flat_map(|m| m.genres.iter().map(|g| g.to_lowercase()))
            .collect();
        vocabulary.sort_unstable();
        vocabulary.dedup();

        let index: HashMap<String, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, g)| (g.clone(), i))
            .collect();

        let mut vectors: HashMap<MovieId, Array1<f64>> = HashMap::new();
        let mut fingerprint = (movies.len() as u64).wrapping_mul(0x517C_C1B7_2722_0A95);

        for movie in movies {
            let mut vector = Array1::<f64>::zeros(vocabulary.len());
            for genre in &movie.genres {
                if let Some(&i) = index.get(&genre.to_lowercase()) {
                    vector[i] = 1.0;
                }
            }
            vectors.insert(movie.movie_id, vector);

            let mut hasher = DefaultHasher::new();
            movie.movie_id.hash(&mut hasher);
            let mut tags: Vec<&String> = movie.genres.iter().collect();
            tags.sort();
            tags.hash(&mut hasher);
            fingerprint = fingerprint.wrapping_add(hasher.finish());
        }

        Self {
            vocabulary,
            index,
            vectors,
            fingerprint,
        }
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn contains(&self, movie_id: MovieId) -> bool {
        self.vectors.contains_key(&movie_id)
    }

    pub fn vector(&self, movie_id: MovieId) -> Option<&Array1<f64>> {
        self.vectors.get(&movie_id)
    }

    /// Movie ids in ascending order.
    pub fn movies(&self) -> Vec<MovieId> {
        let mut ids: Vec<MovieId> = self.vectors.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Binary vector for an explicit genre preference; tags outside the
    /// vocabulary are ignored.
    pub fn vector_for_genres(&self, genres: &[String]) -> Array1<f64> {
        let mut vector = Array1::<f64>::zeros(self.vocabulary.len());
        for genre in genres {
            if let Some(&i) = self.index.get(&genre.to_lowercase()) {
                vector[i] = 1.0;
            }
        }
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn meta(movie_id: MovieId, genres: &[&str]) -> MovieMetadata {
        MovieMetadata {
            movie_id,
            genres: genres.iter().map(|g| g.to_string()).collect::<HashSet<_>>(),
        }
    }

    #[test]
    fn test_matrix_indexes_both_ways() {
        let events = vec![
            RatingEvent::new(1, 10, 4.0),
            RatingEvent::new(1, 11, 3.5),
            RatingEvent::new(2, 10, 5.0),
        ];
        let matrix = RatingMatrix::from_events(&events).unwrap();

        assert_eq!(matrix.num_users(), 2);
        assert_eq!(matrix.num_movies(), 2);
        assert_eq!(matrix.ratings_of(1).unwrap().get(&11), Some(&3.5));
        assert_eq!(matrix.raters_of(10).unwrap().get(&2), Some(&5.0));
        assert!(matrix.has_rated(1, 10));
        assert!(!matrix.has_rated(2, 11));
    }

    #[test]
    fn test_out_of_range_rating_rejected() {
        let events = vec![RatingEvent::new(1, 10, 5.5)];
        let err = RatingMatrix::from_events(&events).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRating { rating, .. } if rating == 5.5));

        let events = vec![RatingEvent::new(1, 10, 0.0)];
        assert!(RatingMatrix::from_events(&events).is_err());
    }

    #[test]
    fn test_duplicate_rating_resolves_to_most_recent() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let events = vec![
            RatingEvent {
                user_id: 1,
                movie_id: 10,
                rating: 4.0,
                rated_at: Some(late),
            },
            RatingEvent {
                user_id: 1,
                movie_id: 10,
                rating: 2.0,
                rated_at: Some(early),
            },
        ];
        let matrix = RatingMatrix::from_events(&events).unwrap();
        assert_eq!(matrix.ratings_of(1).unwrap().get(&10), Some(&4.0));

        // Without timestamps the last event wins
        let events = vec![RatingEvent::new(1, 10, 2.0), RatingEvent::new(1, 10, 3.0)];
        let matrix = RatingMatrix::from_events(&events).unwrap();
        assert_eq!(matrix.ratings_of(1).unwrap().get(&10), Some(&3.0));
    }

    #[test]
    fn test_fingerprint_is_order_independent() {
        let a = vec![RatingEvent::new(1, 10, 4.0), RatingEvent::new(2, 11, 3.0)];
        let b = vec![RatingEvent::new(2, 11, 3.0), RatingEvent::new(1, 10, 4.0)];

        let fp_a = RatingMatrix::from_events(&a).unwrap().fingerprint();
        let fp_b = RatingMatrix::from_events(&b).unwrap().fingerprint();
        assert_eq!(fp_a, fp_b);

        let c = vec![RatingEvent::new(1, 10, 4.5), RatingEvent::new(2, 11, 3.0)];
        let fp_c = RatingMatrix::from_events(&c).unwrap().fingerprint();
        assert_ne!(fp_a, fp_c);
    }

    #[test]
    fn test_user_mean() {
        let events = vec![
            RatingEvent::new(1, 10, 5.0),
            RatingEvent::new(1, 11, 3.0),
            RatingEvent::new(1, 12, 4.0),
        ];
        let matrix = RatingMatrix::from_events(&events).unwrap();
        assert!((matrix.user_mean(1) - 4.0).abs() < 1e-9);
        assert!((matrix.user_mean(99) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_feature_vectors_share_the_vocabulary() {
        let movies = vec![
            meta(1, &["Action", "Comedy"]),
            meta(2, &["Drama"]),
            meta(3, &[]),
        ];
        let features = FeatureMatrix::from_metadata(&movies);

        assert_eq!(features.vocabulary_len(), 3);
        for id in [1, 2, 3] {
            assert_eq!(features.vector(id).unwrap().len(), 3);
        }
        // Untagged movie gets the zero vector
        assert!(features.vector(3).unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_genre_matching_is_case_insensitive() {
        let movies = vec![meta(1, &["Sci-Fi"])];
        let features = FeatureMatrix::from_metadata(&movies);

        let preference = features.vector_for_genres(&["sci-fi".to_string()]);
        assert_eq!(preference, *features.vector(1).unwrap());
    }
}
