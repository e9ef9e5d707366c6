//! Cross-encoder reranking.
//!
//! A [`RelevanceScorer`] assigns one relevance score to every
//! `(query, passage)` pair. [`rerank`] replaces each candidate's score with
//! that value and stable-sorts descending, so equal scores keep their
//! incoming order.
//!
//! Reranking is the main precision signal, so a scorer failure is a hard
//! [`RetrievalError::Rerank`] rather than a silent pass-through.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::error::RetrievalError;
use crate::models::RankedCandidate;

/// A pairwise relevance model (typically a cross-encoder).
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// Returns the model identifier.
    fn model_name(&self) -> &str;

    /// Score each passage against `query`; one score per passage, in order.
    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>>;
}

/// Rescore and reorder `candidates` for `query`, best first.
pub async fn rerank(
    query: &str,
    mut candidates: Vec<RankedCandidate>,
    scorer: &dyn RelevanceScorer,
) -> Result<Vec<RankedCandidate>, RetrievalError> {
    if candidates.is_empty() {
        return Ok(candidates);
    }

    let texts: Vec<&str> = candidates
        .iter()
        .map(|c| c.passage.content.as_str())
        .collect();
    let scores = scorer
        .score(query, &texts)
        .await
        .map_err(RetrievalError::Rerank)?;

    if scores.len() != candidates.len() {
        return Err(RetrievalError::Rerank(anyhow!(
            "scorer '{}' returned {} scores for {} candidates",
            scorer.model_name(),
            scores.len(),
            candidates.len()
        )));
    }

    // NaN sinks to the bottom so output scores stay non-increasing.
    for (candidate, score) in candidates.iter_mut().zip(scores) {
        candidate.score = if score.is_nan() {
            f64::NEG_INFINITY
        } else {
            f64::from(score)
        };
    }
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(candidates)
}
