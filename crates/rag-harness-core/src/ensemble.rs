//! Ensemble retrieval: lexical + semantic with weighted rank fusion.
//!
//! The two sub-retrievers score on incomparable scales (BM25 vs cosine),
//! so lists are merged by rank, not by raw score:
//!
//! ```text
//! fused(p) = Σ_i  w_i / (c + rank_i(p))      rank_i 1-based, c = 60
//! ```
//!
//! A passage found by both retrievers collapses to one entry carrying the
//! summed contribution, so it always scores at least what either list
//! alone would give it. Ties keep first-appearance order (lexical list
//! first).

use std::collections::HashMap;

use anyhow::{bail, Result};
use tracing::{debug, warn};

use crate::embedding::Embedder;
use crate::lexical::LexicalIndex;
use crate::models::{CandidateOrigin, Passage, RankedCandidate};
use crate::semantic::SemanticIndex;

/// Default smoothing constant for reciprocal-rank fusion.
pub const DEFAULT_RRF_K: u32 = 60;

/// Fixed, configured weights of the two sub-retrievers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnsembleWeights {
    pub lexical: f64,
    pub semantic: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            lexical: 0.4,
            semantic: 0.6,
        }
    }
}

impl EnsembleWeights {
    /// Validate that both weights lie in `[0, 1]` and sum to 1.
    pub fn new(lexical: f64, semantic: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&lexical) || !(0.0..=1.0).contains(&semantic) {
            bail!("ensemble weights must be in [0.0, 1.0], got {lexical} and {semantic}");
        }
        if ((lexical + semantic) - 1.0).abs() > 1e-6 {
            bail!("ensemble weights must sum to 1.0, got {}", lexical + semantic);
        }
        Ok(Self { lexical, semantic })
    }
}

/// Per-retriever candidate depths and fusion constant.
#[derive(Debug, Clone)]
pub struct EnsembleParams {
    pub weights: EnsembleWeights,
    pub lexical_k: usize,
    pub semantic_k: usize,
    pub rrf_k: u32,
}

impl Default for EnsembleParams {
    fn default() -> Self {
        Self {
            weights: EnsembleWeights::default(),
            lexical_k: 4,
            semantic_k: 5,
            rrf_k: DEFAULT_RRF_K,
        }
    }
}

/// Fuse ranked lists of positions with weighted reciprocal-rank fusion.
///
/// Each input is a list of passage positions, best first, paired with its
/// weight. Returns `(position, fused_score)` sorted best first.
pub fn weighted_rank_fusion(lists: &[(&[usize], f64)], rrf_k: u32) -> Vec<(usize, f64)> {
    let mut scores: HashMap<usize, f64> = HashMap::new();
    let mut first_seen: Vec<usize> = Vec::new();

    for (list, weight) in lists {
        for (rank0, &pos) in list.iter().enumerate() {
            let contribution = weight / (rrf_k as f64 + rank0 as f64 + 1.0);
            let entry = scores.entry(pos).or_insert_with(|| {
                first_seen.push(pos);
                0.0
            });
            *entry += contribution;
        }
    }

    let mut fused: Vec<(usize, f64)> = first_seen
        .into_iter()
        .map(|pos| (pos, scores[&pos]))
        .collect();
    fused.sort_by(|a, b| b.1.total_cmp(&a.1));
    fused
}

/// Lexical + semantic retriever over one passage corpus.
#[derive(Debug, Clone)]
pub struct EnsembleRetriever {
    lexical: LexicalIndex,
    semantic: SemanticIndex,
    params: EnsembleParams,
}

impl EnsembleRetriever {
    pub fn new(lexical: LexicalIndex, semantic: SemanticIndex, params: EnsembleParams) -> Self {
        Self {
            lexical,
            semantic,
            params,
        }
    }

    pub fn params(&self) -> &EnsembleParams {
        &self.params
    }

    /// Retrieve and fuse candidates for `query`.
    ///
    /// A failure to embed the query degrades to lexical-only results.
    pub async fn retrieve(
        &self,
        query: &str,
        passages: &[Passage],
        embedder: &dyn Embedder,
    ) -> Vec<RankedCandidate> {
        let lexical: Vec<usize> = self
            .lexical
            .search(query, self.params.lexical_k)
            .into_iter()
            .map(|(pos, _)| pos)
            .collect();

        let semantic: Vec<usize> = match embedder.embed_one(query).await {
            Ok(query_vec) => self
                .semantic
                .search(&query_vec, self.params.semantic_k)
                .into_iter()
                .map(|(pos, _)| pos)
                .collect(),
            Err(e) => {
                warn!(error = %e, "query embedding failed; using lexical results only");
                Vec::new()
            }
        };

        debug!(
            lexical = lexical.len(),
            semantic = semantic.len(),
            "ensemble sub-retriever hits"
        );

        let weights = self.params.weights;
        weighted_rank_fusion(
            &[
                (lexical.as_slice(), weights.lexical),
                (semantic.as_slice(), weights.semantic),
            ],
            self.params.rrf_k,
        )
        .into_iter()
        .filter_map(|(pos, score)| {
            passages.get(pos).map(|p| RankedCandidate {
                passage: p.clone(),
                score,
                origin: CandidateOrigin::Ensemble,
            })
        })
        .collect()
    }
}
