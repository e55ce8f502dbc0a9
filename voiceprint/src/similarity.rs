//! Cosine similarity and nearest-match ranking over caller-supplied embeddings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::VoiceprintError;

/// Similarity above which two voices are considered the same speaker.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.7;

/// Computes the cosine similarity of two vectors.
///
/// Returns a value in `[-1, 1]`. Uses f64 intermediate precision.
/// A zero vector has similarity 0 with everything. Infinite or NaN
/// components are rejected.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, VoiceprintError> {
    if a.is_empty() || b.is_empty() {
        return Err(VoiceprintError::EmptyEmbedding);
    }
    if a.len() != b.len() {
        return Err(VoiceprintError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }

    let mut dot: f64 = 0.0;
    let mut norm_a: f64 = 0.0;
    let mut norm_b: f64 = 0.0;
    for (index, (&x, &y)) in a.iter().zip(b).enumerate() {
        if !x.is_finite() || !y.is_finite() {
            return Err(VoiceprintError::NonFinite { index });
        }
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    // Clamp to [-1, 1] to absorb floating point error.
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32)
}

/// A stored voice to compare against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Caller-defined identifier, passed through unchanged.
    pub id: Value,
    pub embedding: Vec<f32>,
    /// Caller-defined metadata, passed through unchanged.
    #[serde(default = "empty_metadata")]
    pub metadata: Value,
}

fn empty_metadata() -> Value {
    Value::Object(Default::default())
}

/// A candidate scored against the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMatch {
    pub id: Value,
    pub similarity: f32,
    pub metadata: Value,
}

/// Result of [`find_closest_match`].
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// Id of the most similar candidate; `None` for an empty collection.
    pub best_id: Option<Value>,
    /// Similarity of the best candidate, 0 for an empty collection.
    pub best_similarity: f32,
    /// Every candidate, most similar first.
    pub ranked: Vec<RankedMatch>,
}

impl MatchOutcome {
    /// Returns the first `n` ranked matches.
    pub fn top(&self, n: usize) -> &[RankedMatch] {
        &self.ranked[..n.min(self.ranked.len())]
    }
}

/// Scores every candidate against `query` and ranks them by descending
/// similarity. Candidates with equal scores keep their input order.
///
/// Fails if any candidate's dimension differs from the query's.
pub fn find_closest_match(
    query: &[f32],
    candidates: &[Candidate],
) -> Result<MatchOutcome, VoiceprintError> {
    let mut ranked = candidates
        .iter()
        .map(|c| {
            Ok(RankedMatch {
                id: c.id.clone(),
                similarity: cosine_similarity(query, &c.embedding)?,
                metadata: c.metadata.clone(),
            })
        })
        .collect::<Result<Vec<_>, VoiceprintError>>()?;

    ranked.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

    let (best_id, best_similarity) = match ranked.first() {
        Some(best) => (Some(best.id.clone()), best.similarity),
        None => (None, 0.0),
    };

    Ok(MatchOutcome {
        best_id,
        best_similarity,
        ranked,
    })
}
