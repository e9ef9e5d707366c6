//! The built retrieval state for one corpus.
//!
//! A [`RetrievalPipeline`] bundles the passages with every index built
//! from them. It is built once and read-only afterwards, so a shared
//! reference can serve any number of concurrent queries.

use tracing::info;

use crate::chunk::make_passage;
use crate::embedding::Embedder;
use crate::ensemble::{EnsembleParams, EnsembleRetriever};
use crate::error::BuildError;
use crate::graph::KnowledgeGraph;
use crate::lexical::LexicalIndex;
use crate::models::{CandidateOrigin, Passage, RankedCandidate};
use crate::semantic::SemanticIndex;

/// Build-time settings.
#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub ensemble: EnsembleParams,
    /// Passages per embedding request.
    pub embed_batch_size: usize,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            ensemble: EnsembleParams::default(),
            embed_batch_size: 64,
        }
    }
}

/// Passages plus the lexical/semantic ensemble and the knowledge graph.
#[derive(Debug)]
pub struct RetrievalPipeline {
    passages: Vec<Passage>,
    ensemble: EnsembleRetriever,
    graph: KnowledgeGraph,
}

impl RetrievalPipeline {
    /// Index `passages`.
    ///
    /// Fails with [`BuildError::EmptyCorpus`] for no passages, or with an
    /// embedding error from the semantic index.
    pub async fn build(
        passages: Vec<Passage>,
        embedder: &dyn Embedder,
        params: &PipelineParams,
    ) -> Result<Self, BuildError> {
        if passages.is_empty() {
            return Err(BuildError::EmptyCorpus);
        }

        let lexical = LexicalIndex::build(&passages)?;
        let graph = KnowledgeGraph::build(&passages);
        let semantic = SemanticIndex::build(&passages, embedder, params.embed_batch_size).await?;

        info!(
            passages = passages.len(),
            graph_nodes = graph.node_count(),
            graph_edges = graph.edge_count(),
            model = embedder.model_name(),
            "retrieval pipeline built"
        );

        Ok(Self {
            passages,
            ensemble: EnsembleRetriever::new(lexical, semantic, params.ensemble.clone()),
            graph,
        })
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    pub fn ensemble(&self) -> &EnsembleRetriever {
        &self.ensemble
    }

    /// Fused lexical + semantic candidates, best first.
    pub async fn ensemble_candidates(
        &self,
        query: &str,
        embedder: &dyn Embedder,
    ) -> Vec<RankedCandidate> {
        self.ensemble.retrieve(query, &self.passages, embedder).await
    }

    /// Graph neighbours of entities matching `query`, as pseudo-passages.
    ///
    /// Scores are `0.0`: graph hits are positioned by [`graph_first`], not
    /// by score.
    pub fn graph_candidates(&self, query: &str, top_k: usize) -> Vec<RankedCandidate> {
        self.graph
            .query(query, top_k)
            .into_iter()
            .enumerate()
            .map(|(i, entity)| RankedCandidate {
                passage: make_passage(None, i, entity.to_string()),
                score: 0.0,
                origin: CandidateOrigin::Graph,
            })
            .collect()
    }
}

/// Graph evidence first: `graph ++ ensemble`, no score blending.
pub fn graph_first(
    graph: Vec<RankedCandidate>,
    ensemble: Vec<RankedCandidate>,
) -> Vec<RankedCandidate> {
    let mut merged = graph;
    merged.extend(ensemble);
    merged
}
