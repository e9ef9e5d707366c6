//! The retrieval service: owns one pipeline and its lifecycle.
//!
//! ```text
//! EMPTY ──ingest──▶ BUILDING ──ok──▶ READY
//!   ▲                  │
//!   └──────error───────┘
//! ```
//!
//! The build is single-flight: the first `ingest` takes the build lock,
//! concurrent callers get [`IngestOutcome::AlreadyBuilding`] immediately,
//! and once built every further call gets [`IngestOutcome::AlreadyReady`].
//! `READY` is terminal; a new corpus needs a new service.
//!
//! Per query the stages run in order: expand (HyDE) → ensemble → graph
//! → graph-first merge → rerank → truncate to `max_contexts`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use rag_harness_core::chunk::ChunkParams;
use rag_harness_core::embedding::Embedder;
use rag_harness_core::error::{BuildError, PipelineState, RetrievalError};
use rag_harness_core::extract::{documents_to_passages, PlainTextExtractor, TextExtractor};
use rag_harness_core::generation::{GenerateOptions, Generator};
use rag_harness_core::models::{RankedCandidate, RawDocument};
use rag_harness_core::pipeline::{graph_first, PipelineParams, RetrievalPipeline};
use rag_harness_core::rerank::{rerank, RelevanceScorer};

use crate::config::{Config, RetrievalSettings};
use crate::embedding::create_embedder;
use crate::expansion::QueryExpander;
use crate::generation::OllamaGenerator;
use crate::rerank::create_scorer;

/// Result of an [`RetrievalService::ingest`] call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// This call built the pipeline.
    Built { documents: usize, passages: usize },
    /// A pipeline already exists; nothing was done.
    AlreadyReady,
    /// Another call is building right now; nothing was done.
    AlreadyBuilding,
}

/// Per-query inputs beyond the query text.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Recent conversation, fed to query expansion.
    pub chat_context: Option<String>,
}

/// Intermediate results of one query.
#[derive(Debug, Clone)]
pub struct RetrievalTrace {
    /// Query after HyDE expansion (the raw query if expansion was skipped).
    pub expanded_query: String,
    /// Graph-first merged candidates, before reranking.
    pub candidates: Vec<RankedCandidate>,
    /// Final ranked, truncated list.
    pub results: Vec<RankedCandidate>,
}

/// Construction-time parameters.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub chunk: ChunkParams,
    pub pipeline: PipelineParams,
    pub graph_top_k: usize,
    pub hyde_timeout: Duration,
    /// `num_ctx` for expansion calls.
    pub context_window: u32,
    pub settings: RetrievalSettings,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            chunk: ChunkParams::default(),
            pipeline: PipelineParams::default(),
            graph_top_k: 5,
            hyde_timeout: Duration::from_secs(30),
            context_window: 4096,
            settings: RetrievalSettings::default(),
        }
    }
}

impl ServiceOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            chunk: config.chunking.params(),
            pipeline: config
                .retrieval
                .pipeline_params(config.embedding.batch_size)?,
            graph_top_k: config.retrieval.graph_top_k,
            hyde_timeout: Duration::from_secs(config.retrieval.hyde_timeout_secs),
            context_window: config.generation.context_window,
            settings: config.retrieval.settings(),
        })
    }
}

pub struct RetrievalService {
    embedder: Arc<dyn Embedder>,
    scorer: Arc<dyn RelevanceScorer>,
    expander: QueryExpander,
    extractor: Arc<dyn TextExtractor>,
    chunk: ChunkParams,
    pipeline_params: PipelineParams,
    graph_top_k: usize,
    context_window: u32,
    settings: RwLock<RetrievalSettings>,
    build_lock: tokio::sync::Mutex<()>,
    building: AtomicBool,
    pipeline: OnceLock<Arc<RetrievalPipeline>>,
}

/// Clears the `building` flag when the build ends, including on cancellation.
struct BuildingFlag<'a>(&'a AtomicBool);

impl<'a> BuildingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for BuildingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl RetrievalService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        scorer: Arc<dyn RelevanceScorer>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            embedder,
            scorer,
            expander: QueryExpander::new(generator, options.hyde_timeout),
            extractor: Arc::new(PlainTextExtractor),
            chunk: options.chunk,
            pipeline_params: options.pipeline,
            graph_top_k: options.graph_top_k,
            context_window: options.context_window,
            settings: RwLock::new(options.settings),
            build_lock: tokio::sync::Mutex::new(()),
            building: AtomicBool::new(false),
            pipeline: OnceLock::new(),
        }
    }

    /// Service with the Ollama, embedding and reranker backends named in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(config)?;
        let generator: Arc<dyn Generator> = Arc::new(OllamaGenerator::from_config(config)?);
        let scorer = create_scorer(config)?;
        Ok(Self::new(
            embedder,
            generator,
            scorer,
            ServiceOptions::from_config(config)?,
        ))
    }

    /// Replace the document text extractor (default: [`PlainTextExtractor`]).
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn state(&self) -> PipelineState {
        if self.pipeline.get().is_some() {
            PipelineState::Ready
        } else if self.building.load(Ordering::SeqCst) {
            PipelineState::Building
        } else {
            PipelineState::Empty
        }
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> RetrievalSettings {
        self.settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the settings; queries already running keep their snapshot.
    pub fn update_settings(&self, settings: RetrievalSettings) {
        let mut guard = self
            .settings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = settings;
    }

    /// Build the pipeline from `documents`, at most once.
    pub async fn ingest(&self, documents: Vec<RawDocument>) -> Result<IngestOutcome, BuildError> {
        if self.pipeline.get().is_some() {
            return Ok(IngestOutcome::AlreadyReady);
        }
        let Ok(_guard) = self.build_lock.try_lock() else {
            debug!("ingest skipped: build already in progress");
            return Ok(IngestOutcome::AlreadyBuilding);
        };
        // A build may have completed between the check and the lock.
        if self.pipeline.get().is_some() {
            return Ok(IngestOutcome::AlreadyReady);
        }

        let _flag = BuildingFlag::raise(&self.building);
        info!(documents = documents.len(), "building retrieval pipeline");

        match self.build(&documents).await {
            Ok(pipeline) => {
                let passages = pipeline.passages().len();
                // Only the build-lock holder sets the cell.
                let _ = self.pipeline.set(Arc::new(pipeline));
                info!(documents = documents.len(), passages, "retrieval pipeline ready");
                Ok(IngestOutcome::Built {
                    documents: documents.len(),
                    passages,
                })
            }
            Err(e) => {
                warn!(error = %e, "pipeline build failed");
                Err(e)
            }
        }
    }

    async fn build(&self, documents: &[RawDocument]) -> Result<RetrievalPipeline, BuildError> {
        let passages = documents_to_passages(documents, self.extractor.as_ref(), &self.chunk)?;
        RetrievalPipeline::build(passages, self.embedder.as_ref(), &self.pipeline_params).await
    }

    /// Ranked passages for `text`, at most `max_contexts` of them.
    pub async fn query(
        &self,
        text: &str,
        options: &QueryOptions,
    ) -> Result<Vec<RankedCandidate>, RetrievalError> {
        Ok(self.query_traced(text, options).await?.results)
    }

    /// Like [`query`](Self::query), also returning intermediate results.
    pub async fn query_traced(
        &self,
        text: &str,
        options: &QueryOptions,
    ) -> Result<RetrievalTrace, RetrievalError> {
        let pipeline = self
            .pipeline
            .get()
            .cloned()
            .ok_or_else(|| RetrievalError::NotReady(self.state()))?;
        let settings = self.settings();
        let generate_options = GenerateOptions {
            temperature: settings.temperature,
            context_window: self.context_window,
        };

        let expanded_query = self
            .expander
            .expand(
                text,
                options.chat_context.as_deref(),
                settings.enable_hyde,
                &generate_options,
            )
            .await;

        let ensemble = pipeline
            .ensemble_candidates(&expanded_query, self.embedder.as_ref())
            .await;

        let graph = if settings.enable_graph_rag {
            let hits = pipeline.graph_candidates(text, self.graph_top_k);
            if hits.is_empty() {
                debug!("no graph entities matched the query");
            }
            hits
        } else {
            Vec::new()
        };
        let graph_hits = graph.len();

        let candidates = graph_first(graph, ensemble);

        let mut results = if settings.enable_reranking {
            rerank(text, candidates.clone(), self.scorer.as_ref()).await?
        } else {
            candidates.clone()
        };
        results.truncate(settings.max_contexts);

        info!(
            candidates = candidates.len(),
            graph_hits,
            returned = results.len(),
            hyde = settings.enable_hyde,
            rerank = settings.enable_reranking,
            "query complete"
        );

        Ok(RetrievalTrace {
            expanded_query,
            candidates,
            results,
        })
    }
}
