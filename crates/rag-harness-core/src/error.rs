//! Typed errors for the build and retrieval paths.
//!
//! Only hard failures are represented here. Soft degradations (query
//! expansion failing, the graph matching nothing, a query embedding
//! failing) are logged where they happen and never surface as errors.

use std::fmt;

use thiserror::Error;

/// Lifecycle state of a retrieval pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No corpus has been ingested.
    Empty,
    /// A build is in flight.
    Building,
    /// The pipeline is built and serving queries. Terminal.
    Ready,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Empty => "empty",
            PipelineState::Building => "building",
            PipelineState::Ready => "ready",
        };
        write!(f, "{s}")
    }
}

/// Failure while turning a corpus into a [`RetrievalPipeline`](crate::pipeline::RetrievalPipeline).
///
/// Any variant aborts the whole ingest; the owning service stays `Empty`.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no passages to index")]
    EmptyCorpus,

    #[error("failed to process document '{filename}'")]
    Document {
        filename: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("embedding service failed while building the semantic index")]
    Embedding(#[source] anyhow::Error),

    #[error("embedding service returned {actual} vectors for {expected} passages")]
    EmbeddingCount { expected: usize, actual: usize },
}

/// Failure of a hard-required retrieval stage.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("retrieval pipeline is not ready (state: {0})")]
    NotReady(PipelineState),

    #[error("reranking failed")]
    Rerank(#[source] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_names_state() {
        let err = RetrievalError::NotReady(PipelineState::Building);
        assert_eq!(
            err.to_string(),
            "retrieval pipeline is not ready (state: building)"
        );
    }

    #[test]
    fn test_document_error_keeps_cause() {
        let err = BuildError::Document {
            filename: "notes.txt".to_string(),
            source: anyhow::anyhow!("invalid utf-8"),
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("invalid utf-8"));
    }
}
