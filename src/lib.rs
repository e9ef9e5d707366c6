//! # RAG Harness
//!
//! Hybrid retrieval for local LLM answer generation.
//!
//! Documents are chunked into passages and indexed three ways: BM25, dense
//! embeddings and an entity co-occurrence graph. A query is expanded with
//! a hypothetical answer (HyDE), retrieved through the lexical + semantic
//! ensemble, prefixed with graph neighbours, reranked by a cross-encoder
//! and cut to the configured number of contexts.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────────────────────┐
//! │  --docs  │──▶│  Extractor   │──▶│ RetrievalPipeline (core)  │
//! │  files   │   │ chunk → index│   │ BM25 · vectors · graph    │
//! └──────────┘   └──────────────┘   └────────────┬──────────────┘
//!                                                │
//!        query ──▶ HyDE ──▶ ensemble + graph ──▶ rerank ──▶ top-K
//!                                                │
//!                                          ┌─────▼─────┐
//!                                          │ChatEngine │──▶ Ollama
//!                                          └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | tracing subscriber setup |
//! | [`ollama`] | HTTP client with retry/backoff |
//! | [`embedding`] | Ollama and local embedding backends |
//! | [`generation`] | Streaming Ollama generation |
//! | [`rerank`] | Cross-encoder relevance scorers |
//! | [`expansion`] | HyDE query expansion |
//! | [`ingest`] | Loading documents from disk |
//! | [`service`] | Retrieval service and its state machine |
//! | [`chat`] | Conversational answering |
//! | [`commands`] | CLI subcommands |

pub mod chat;
pub mod commands;
pub mod config;
pub mod embedding;
pub mod expansion;
pub mod generation;
pub mod ingest;
pub mod logging;
pub mod ollama;
pub mod rerank;
pub mod service;
