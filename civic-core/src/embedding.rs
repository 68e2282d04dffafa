//! Embedding vectors and keyword overlap used for incident similarity

use crate::{CivicError, CivicResult, VectorError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sentence embedding of a complaint, produced by the external normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EmbeddingVector {
    pub data: Vec<f32>,
    /// Identifier of the model that produced this embedding.
    pub model_id: String,
    /// Number of dimensions (must match data.len()).
    pub dimensions: usize,
}

impl EmbeddingVector {
    pub fn new(data: Vec<f32>, model_id: impl Into<String>) -> Self {
        let dimensions = data.len();
        Self {
            data,
            model_id: model_id.into(),
            dimensions,
        }
    }

    /// Cosine similarity in [-1, 1]. A zero vector scores 0.
    pub fn cosine_similarity(&self, other: &EmbeddingVector) -> CivicResult<f32> {
        if self.dimensions != other.dimensions {
            return Err(CivicError::Vector(VectorError::DimensionMismatch {
                expected: self.dimensions,
                got: other.dimensions,
            }));
        }

        let mut dot_product = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.data.iter().zip(other.data.iter()) {
            dot_product += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let norm_a = norm_a.sqrt();
        let norm_b = norm_b.sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return Ok(0.0);
        }

        Ok(dot_product / (norm_a * norm_b))
    }

    pub fn is_valid(&self) -> bool {
        self.dimensions > 0 && self.data.len() == self.dimensions
    }

    /// Reject malformed vectors before they are stored.
    pub fn validate(&self) -> CivicResult<()> {
        if !self.is_valid() {
            return Err(CivicError::Vector(VectorError::InvalidVector {
                reason: format!(
                    "declared {} dimensions, carries {} values",
                    self.dimensions,
                    self.data.len()
                ),
            }));
        }
        if self.data.iter().any(|v| !v.is_finite()) {
            return Err(CivicError::Vector(VectorError::InvalidVector {
                reason: "non-finite component".to_string(),
            }));
        }
        Ok(())
    }
}

/// Jaccard index of two keyword lists, compared case-insensitively.
///
/// Two empty lists score 0 so that unclassified complaints never look alike.
pub fn keyword_jaccard(a: &[String], b: &[String]) -> f32 {
    let left = normalized_keywords(a);
    let right = normalized_keywords(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    intersection as f32 / union as f32
}

fn normalized_keywords(keywords: &[String]) -> BTreeSet<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_cosine_is_symmetric_and_bounded(
            pair in (1usize..16).prop_flat_map(|n| (
                prop::collection::vec(-10.0f32..10.0, n),
                prop::collection::vec(-10.0f32..10.0, n),
            ))
        ) {
            let a = EmbeddingVector::new(pair.0, "m");
            let b = EmbeddingVector::new(pair.1, "m");
            let ab = a.cosine_similarity(&b).unwrap();
            let ba = b.cosine_similarity(&a).unwrap();
            prop_assert!((ab - ba).abs() < 1e-4);
            prop_assert!((-1.0001..=1.0001).contains(&ab));
        }

        #[test]
        fn prop_jaccard_in_unit_interval(
            a in prop::collection::vec("[a-d]{1,2}", 0..6),
            b in prop::collection::vec("[a-d]{1,2}", 0..6),
        ) {
            let score = keyword_jaccard(&a, &b);
            prop_assert!((0.0..=1.0).contains(&score));
            prop_assert!((score - keyword_jaccard(&b, &a)).abs() < 1e-6);
        }
    }
}
