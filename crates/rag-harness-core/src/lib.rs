//! # RAG Harness Core
//!
//! Runtime-agnostic retrieval logic for RAG Harness: passage model,
//! chunking, the BM25 lexical index, the embedding-backed semantic index,
//! the entity co-occurrence knowledge graph, weighted rank fusion, and
//! cross-encoder reranking.
//!
//! This crate contains no tokio, HTTP, or filesystem dependencies. The
//! external collaborators (embedding, generation, relevance scoring) are
//! reached through the traits in [`embedding`], [`generation`],
//! [`rerank`] and [`extract`]; concrete clients live in the `rag-harness` app crate.
//!
//! ## Pipeline
//!
//! ```text
//! passages ──┬─▶ LexicalIndex  ─┐
//!            ├─▶ SemanticIndex ─┼─▶ EnsembleRetriever ─┐
//!            └─▶ KnowledgeGraph ─────────────────────── ┼─▶ graph_first ─▶ rerank ─▶ top-K
//! ```

pub mod chunk;
pub mod embedding;
pub mod ensemble;
pub mod error;
pub mod extract;
pub mod generation;
pub mod graph;
pub mod history;
pub mod lexical;
pub mod models;
pub mod pipeline;
pub mod rerank;
pub mod semantic;
