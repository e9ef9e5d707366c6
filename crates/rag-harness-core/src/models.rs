//! Core data types shared by the indexes and the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable unit of retrievable text.
///
/// Created by the chunker and never mutated afterwards. Graph
/// pseudo-passages (bare entity names) are also represented as passages,
/// with no `source_id` and a fresh id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Passage UUID.
    pub id: String,
    /// Passage text.
    pub content: String,
    /// Originating document (file name), if any.
    pub source_id: Option<String>,
    /// Position within the originating document.
    pub chunk_index: usize,
    /// SHA-256 of `content`.
    pub hash: String,
}

/// Which retrieval signal produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    Graph,
    Ensemble,
}

/// A passage with an ephemeral relevance score used only for ordering.
///
/// Scores from different stages (fusion, reranker) are on different
/// scales and must not be compared with each other.
#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    pub passage: Passage,
    pub score: f64,
    pub origin: CandidateOrigin,
}

/// A document as handed over by the document source.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl RawDocument {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Lower-cased extension of `filename`, without the dot.
    pub fn extension(&self) -> Option<String> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of a [`ChatHistory`](crate::history::ChatHistory).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}
