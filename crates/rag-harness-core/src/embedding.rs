//! Embedding service trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that every embedding backend implements,
//! plus the similarity function used by the semantic index.
//!
//! Concrete backends (Ollama, fastembed) live in the `rag-harness` app crate.

use anyhow::Result;
use async_trait::async_trait;

/// An embedding backend.
///
/// Implementations must return exactly one vector per input text, in
/// input order. Errors are reported as-is; the caller decides whether a
/// failure is fatal (index build) or a soft degradation (query time).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;

    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`. Empty, mismatched, zero-magnitude or
/// non-finite inputs give `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom.is_nan() || denom < f32::EPSILON {
        return 0.0;
    }

    let sim = dot / denom;
    if sim.is_finite() {
        sim
    } else {
        0.0
    }
}
