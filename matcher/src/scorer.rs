//! Relevance of one paper against the whole anchor set.
//!
//! A paper's score is its best cosine similarity to any single anchor, not
//! the mean: strong overlap with one interest is enough to be relevant.

use paperfeed_embeddings::{EmbeddingMap, best_match};
use serde::{Deserialize, Serialize};

use crate::error::{MatcherError, Result};

/// The anchor a paper matched best and how well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorMatch {
    pub anchor_id: String,

    /// Cosine similarity clamped to [0.0, 1.0].
    pub score: f32,
}

/// Score `paper_vector` against every anchor vector and keep the best.
///
/// Ties go to the earliest anchor in `anchor_vectors`. Fails with
/// [`MatcherError::NoAnchors`] when there is nothing to compare against.
pub fn score(paper_vector: &[f32], anchor_vectors: &EmbeddingMap) -> Result<AnchorMatch> {
    let best = best_match(
        paper_vector,
        anchor_vectors.iter().map(|(id, v)| (id.as_str(), v)),
    )?
    .ok_or(MatcherError::NoAnchors)?;

    Ok(AnchorMatch {
        anchor_id: best.id,
        score: clamp_score(best.score),
    })
}

/// Negative similarity carries no relevance; rounding may push identical
/// vectors a hair above 1.0.
pub(crate) fn clamp_score(similarity: f32) -> f32 {
    similarity.clamp(0.0, 1.0)
}
