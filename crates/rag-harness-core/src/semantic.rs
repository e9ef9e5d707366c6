//! Exact nearest-neighbour index over passage embeddings.
//!
//! Every passage is embedded once at build time through an [`Embedder`].
//! Lookups are brute-force cosine similarity, which is exact and fast
//! enough for per-session corpora.

use tracing::debug;

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::BuildError;
use crate::models::Passage;

/// Semantic index. Positions refer to the passage slice it was built from.
#[derive(Debug, Clone)]
pub struct SemanticIndex {
    vectors: Vec<Vec<f32>>,
}

impl SemanticIndex {
    /// Embed `passages` in batches of `batch_size` and index the vectors.
    ///
    /// # Errors
    ///
    /// - [`BuildError::EmptyCorpus`] for an empty slice.
    /// - [`BuildError::Embedding`] if any batch fails.
    /// - [`BuildError::EmbeddingCount`] if the backend returns the wrong
    ///   number of vectors.
    pub async fn build(
        passages: &[Passage],
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Self, BuildError> {
        if passages.is_empty() {
            return Err(BuildError::EmptyCorpus);
        }

        let batch_size = batch_size.max(1);
        let mut vectors = Vec::with_capacity(passages.len());

        for (batch_no, batch) in passages.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|p| p.content.clone()).collect();
            let mut embedded = embedder.embed(&texts).await.map_err(BuildError::Embedding)?;
            if embedded.len() != texts.len() {
                return Err(BuildError::EmbeddingCount {
                    expected: passages.len(),
                    actual: vectors.len() + embedded.len(),
                });
            }
            debug!(
                batch = batch_no,
                size = texts.len(),
                model = embedder.model_name(),
                "embedded passage batch"
            );
            vectors.append(&mut embedded);
        }

        Ok(Self { vectors })
    }

    /// Build directly from precomputed vectors.
    pub fn from_vectors(vectors: Vec<Vec<f32>>) -> Result<Self, BuildError> {
        if vectors.is_empty() {
            return Err(BuildError::EmptyCorpus);
        }
        Ok(Self { vectors })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Top `k` passages by cosine similarity as `(position, similarity)`.
    ///
    /// Equal similarities keep corpus order.
    pub fn search(&self, query_vec: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut ranked: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query_vec, v)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(k);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::make_passage;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// One dimension per keyword: [rust, python, cooking].
    struct KeywordEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keywords"
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    ["rust", "python", "cooking"]
                        .iter()
                        .map(|k| t.matches(k).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0]])
        }
    }

    fn passages() -> Vec<Passage> {
        ["Rust and more rust", "Python scripting", "Cooking pasta", "Rust meets Python"]
            .iter()
            .enumerate()
            .map(|(i, t)| make_passage(None, i, t.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_builds_in_batches_and_finds_nearest() {
        let embedder = KeywordEmbedder {
            calls: AtomicUsize::new(0),
        };
        let index = SemanticIndex::build(&passages(), &embedder, 3).await.unwrap();
        assert_eq!(index.len(), 4);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);

        let hits = index.search(&[1.0, 0.0, 0.0], 2);
        assert_eq!(hits[0].0, 0);
        assert_eq!(hits[1].0, 3);
    }

    #[tokio::test]
    async fn test_count_mismatch_is_an_error() {
        let err = SemanticIndex::build(&passages(), &ShortEmbedder, 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::EmbeddingCount {
                expected: 4,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_empty_vectors_rejected() {
        assert!(matches!(
            SemanticIndex::from_vectors(Vec::new()),
            Err(BuildError::EmptyCorpus)
        ));
    }
}
