//! Face-descriptor similarity engine.
//!
//! Compares two facial feature vectors and renders a match/no-match verdict
//! with a numeric confidence distance. The metric is cosine distance,
//! `1 − dot(a,b)/(‖a‖·‖b‖)`, so lower is more similar; a match requires
//! `distance ≤ threshold`.
//!
//! Registration and kiosk capture may run different feature-extractor
//! versions over the system's lifetime, so the two vectors are not
//! guaranteed to share a dimension. Silently comparing mismatched-dimension
//! vectors would produce meaningless results; the engine refuses to compute
//! locally and signals [`SimilarityError::DimensionMismatch`] instead, and
//! the caller falls back to the server-side comparison endpoint. The
//! server's higher-is-better score is converted back into the same
//! lower-is-better contract via [`Verdict::from_server_score`], so callers
//! see one uniform numeric convention regardless of which path executed.

use thiserror::Error;

/// Default acceptance threshold. Lower is stricter.
pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// Upper bound of the cosine-distance range, used for degenerate inputs
/// (zero-magnitude vectors) so they can never match.
pub const MAX_COSINE_DISTANCE: f64 = 2.0;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SimilarityError {
    /// The vectors come from different feature-extractor versions; a local
    /// distance would be meaningless. Callers must use the server-side
    /// comparison instead.
    #[error("embedding dimension mismatch: captured {captured}, stored {stored}")]
    DimensionMismatch { captured: usize, stored: usize },

    #[error("empty embedding vectors cannot be compared")]
    Empty,
}

/// Outcome of a similarity comparison, local or server-side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Verdict {
    pub matched: bool,
    /// Cosine-style distance, lower = more similar.
    pub distance: f64,
    pub threshold: f64,
}

impl Verdict {
    /// Convert a server-side similarity score (higher = more similar, 0..1)
    /// into the lower-is-better distance convention:
    /// `distance = 1 − score`, `threshold = 1 − server_threshold`.
    pub fn from_server_score(score: f64, server_threshold: f64) -> Self {
        let distance = 1.0 - score;
        let threshold = 1.0 - server_threshold;
        Self {
            matched: distance <= threshold,
            distance,
            threshold,
        }
    }
}

/// Compare a captured descriptor against the stored one.
///
/// Zero-magnitude vectors yield [`MAX_COSINE_DISTANCE`] (no match), never a
/// division error. Unequal lengths never produce a numeric distance.
pub fn compare(captured: &[f32], stored: &[f32], threshold: f64) -> Result<Verdict, SimilarityError> {
    if captured.len() != stored.len() {
        return Err(SimilarityError::DimensionMismatch {
            captured: captured.len(),
            stored: stored.len(),
        });
    }
    if captured.is_empty() {
        return Err(SimilarityError::Empty);
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (a, b) in captured.iter().zip(stored.iter()) {
        let (a, b) = (f64::from(*a), f64::from(*b));
        dot += a * b;
        norm_a += a * a;
        norm_b += b * b;
    }

    let magnitude = norm_a.sqrt() * norm_b.sqrt();
    let distance = if magnitude == 0.0 {
        MAX_COSINE_DISTANCE
    } else {
        1.0 - dot / magnitude
    };

    Ok(Verdict {
        matched: distance <= threshold,
        distance,
        threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identical_vectors_have_zero_distance() {
        let v = [0.3f32, -0.5, 0.8, 0.1];
        let verdict = compare(&v, &v, DEFAULT_THRESHOLD).unwrap();
        assert!(verdict.distance.abs() < 1e-9);
        assert!(verdict.matched);
    }

    #[test]
    fn orthogonal_vectors_do_not_match() {
        let a = [1.0f32, 0.0];
        let b = [0.0f32, 1.0];
        let verdict = compare(&a, &b, DEFAULT_THRESHOLD).unwrap();
        assert!((verdict.distance - 1.0).abs() < 1e-9);
        assert!(!verdict.matched);
    }

    #[test]
    fn opposite_vectors_hit_the_distance_ceiling() {
        let a = [0.6f32, -0.2];
        let b = [-0.6f32, 0.2];
        let verdict = compare(&a, &b, DEFAULT_THRESHOLD).unwrap();
        assert!((verdict.distance - MAX_COSINE_DISTANCE).abs() < 1e-9);
        assert!(!verdict.matched);
    }

    #[test]
    fn zero_magnitude_yields_max_distance_not_a_panic() {
        let zero = [0.0f32; 4];
        let v = [0.1f32, 0.2, 0.3, 0.4];
        let verdict = compare(&zero, &v, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(verdict.distance, MAX_COSINE_DISTANCE);
        assert!(!verdict.matched);
    }

    #[test]
    fn dimension_mismatch_is_signaled_not_computed() {
        let a = [0.1f32; 128];
        let b = [0.1f32; 512];
        assert_eq!(
            compare(&a, &b, DEFAULT_THRESHOLD),
            Err(SimilarityError::DimensionMismatch {
                captured: 128,
                stored: 512,
            })
        );
    }

    #[test]
    fn empty_vectors_are_rejected() {
        assert_eq!(compare(&[], &[], DEFAULT_THRESHOLD), Err(SimilarityError::Empty));
    }

    #[test]
    fn server_score_converts_to_distance_convention() {
        // score 0.92 against server threshold 0.75 → distance 0.08 ≤ 0.25
        let verdict = Verdict::from_server_score(0.92, 0.75);
        assert!(verdict.matched);
        assert!((verdict.distance - 0.08).abs() < 1e-9);
        assert!((verdict.threshold - 0.25).abs() < 1e-9);

        // score below the server threshold does not match
        let verdict = Verdict::from_server_score(0.5, 0.75);
        assert!(!verdict.matched);
    }

    proptest! {
        #[test]
        fn self_comparison_matches_for_any_nonnegative_threshold(
            v in prop::collection::vec(-1.0f32..1.0, 1..64),
            threshold in 0.0f64..2.0,
        ) {
            // Skip degenerate all-zero draws: those hit the distance ceiling.
            prop_assume!(v.iter().any(|x| *x != 0.0));
            let verdict = compare(&v, &v, threshold).unwrap();
            prop_assert!(verdict.distance.abs() < 1e-6);
            prop_assert!(verdict.matched);
        }

        #[test]
        fn unequal_lengths_always_signal_dimension_mismatch(
            a in prop::collection::vec(-1.0f32..1.0, 1..32),
            b in prop::collection::vec(-1.0f32..1.0, 33..64),
        ) {
            prop_assert_eq!(
                compare(&a, &b, DEFAULT_THRESHOLD),
                Err(SimilarityError::DimensionMismatch {
                    captured: a.len(),
                    stored: b.len(),
                })
            );
        }

        #[test]
        fn distance_stays_in_the_cosine_range(
            a in prop::collection::vec(-1.0f32..1.0, 8),
            b in prop::collection::vec(-1.0f32..1.0, 8),
        ) {
            let verdict = compare(&a, &b, DEFAULT_THRESHOLD).unwrap();
            prop_assert!(verdict.distance >= -1e-6);
            prop_assert!(verdict.distance <= MAX_COSINE_DISTANCE + 1e-6);
        }
    }
}
