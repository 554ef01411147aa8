// Utility functions for score handling.

/// Normalize a score to [0, 1] given the observed range.
///
/// A degenerate range (all scores equal, or a single candidate) maps to 0.5
/// so the value still carries a usable mid-scale weight.
pub fn normalize_score(score: f64, min: f64, max: f64) -> f64 {
    if max - min < f64::EPSILON {
        0.5
    } else {
        ((score - min) / (max - min)).clamp(0.0, 1.0)
    }
}

/// Min/max over a non-empty iterator of scores.
pub fn score_bounds<'a, I>(scores: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = &'a f64>,
{
    let mut bounds: Option<(f64, f64)> = None;
    for &s in scores {
        bounds = Some(match bounds {
            None => (s, s),
            Some((min, max)) => (min.min(s), max.max(s)),
        });
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_score() {
        assert!((normalize_score(5.0, 0.0, 10.0) - 0.5).abs() < 1e-9);
        assert!((normalize_score(10.0, 0.0, 10.0) - 1.0).abs() < 1e-9);
        assert!((normalize_score(0.0, 0.0, 10.0) - 0.0).abs() < 1e-9);
        // Degenerate range collapses to the midpoint
        assert!((normalize_score(3.0, 3.0, 3.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_score_bounds() {
        let scores = [2.0, 7.0, 4.5];
        let (min, max) = score_bounds(scores.iter()).unwrap();
        assert!((min - 2.0).abs() < 1e-9);
        assert!((max - 7.0).abs() < 1e-9);

        let empty: [f64; 0] = [];
        assert!(score_bounds(empty.iter()).is_none());
    }
}
