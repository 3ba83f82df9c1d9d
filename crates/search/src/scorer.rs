//! Scoring for fuzzy and prefix matches
//!
//! A document's score is the sum over leaf queries of
//! `field_boost × match_quality`, where match quality is the best quality
//! among the terms that leaf matched in the document.
//!
//! The default qualities:
//! - fuzzy: `(sim - min_sim) / (1 - min_sim)`, 1.0 for an exact term and
//!   decaying linearly with edit distance
//! - prefix: constant 1.0 per match
//!
//! An exact hit therefore earns both a full fuzzy and a full prefix
//! contribution, which keeps exact matches above near-misses. Boosts are
//! applied outside the scorer, so a Name match always weighs twice an
//! equal-quality Overview match.

// ============================================================================
// Scorer Trait
// ============================================================================

/// Pluggable match-quality interface
///
/// Scorers must be monotonic: a closer fuzzy match never scores lower.
///
/// # Thread Safety
///
/// Scorers must be Send + Sync for concurrent search operations.
pub trait MatchScorer: Send + Sync {
    /// Quality of a fuzzy match with the given similarity
    ///
    /// Only called for `similarity > min_similarity`.
    fn fuzzy_quality(&self, similarity: f32, min_similarity: f32) -> f32;

    /// Quality of a prefix match
    fn prefix_quality(&self) -> f32;

    /// Name for debugging and logging
    fn name(&self) -> &str;
}

// ============================================================================
// LinearScorer
// ============================================================================

/// Default scorer: linear fuzzy decay, constant prefix score
#[derive(Debug, Clone, Copy)]
pub struct LinearScorer {
    prefix_quality: f32,
}

impl Default for LinearScorer {
    fn default() -> Self {
        LinearScorer {
            prefix_quality: 1.0,
        }
    }
}

impl LinearScorer {
    /// Create a scorer with a custom prefix quality
    pub fn with_prefix_quality(prefix_quality: f32) -> Self {
        LinearScorer { prefix_quality }
    }
}

impl MatchScorer for LinearScorer {
    fn fuzzy_quality(&self, similarity: f32, min_similarity: f32) -> f32 {
        let span = 1.0 - min_similarity;
        if span <= 0.0 {
            return 1.0;
        }
        ((similarity - min_similarity) / span).clamp(0.0, 1.0)
    }

    fn prefix_quality(&self) -> f32 {
        self.prefix_quality
    }

    fn name(&self) -> &str {
        "linear"
    }
}
