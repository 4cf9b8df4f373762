//! Vector similarity and ranking
//!
//! Exact cosine similarity plus the threshold / top-k ranking used by
//! linear-scan stores. The PostgreSQL store reproduces the same contract
//! in SQL with pgvector's `<=>` operator.

use crate::error::{Error, Result};

use super::types::SearchOptions;

/// Compute the cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal (or either vector has zero magnitude)
/// - -1.0 means opposite direction
///
/// Accumulates in `f64`. Vectors must have equal length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(Error::dimension_mismatch(a.len(), b.len()));
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}

/// Rank candidates against a query vector.
///
/// Keeps candidates with similarity strictly above `options.threshold`,
/// sorts descending by similarity, and truncates to `options.limit`.
/// The sort is stable, so ties keep the order in which candidates were
/// yielded. Any candidate of the wrong length fails the whole ranking.
pub fn rank<'a, T, I>(query: &[f32], candidates: I, options: &SearchOptions) -> Result<Vec<(T, f64)>>
where
    I: IntoIterator<Item = (T, &'a [f32])>,
{
    let mut scored = Vec::new();
    for (item, vector) in candidates {
        let similarity = cosine_similarity(query, vector)?;
        if similarity > options.threshold {
            scored.push((item, similarity));
        }
    }

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(options.limit);
    Ok(scored)
}
