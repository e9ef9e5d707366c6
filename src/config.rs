//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, see [`Config::default`]) yields a working setup against a local
//! Ollama instance. `OLLAMA_API_URL` in the environment overrides
//! `[ollama].url`.
//!
//! ```toml
//! [ollama]
//! url = "http://localhost:11434"
//!
//! [embedding]
//! provider = "ollama"
//! model = "nomic-embed-text:latest"
//!
//! [generation]
//! model = "qwen3:1.7b"
//!
//! [retrieval]
//! enable_hyde = true
//! max_contexts = 4
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use rag_harness_core::chunk::ChunkParams;
use rag_harness_core::ensemble::{EnsembleParams, EnsembleWeights};
use rag_harness_core::generation::GenerateOptions;
use rag_harness_core::pipeline::PipelineParams;

/// Environment variable that overrides `[ollama].url`.
pub const OLLAMA_URL_ENV: &str = "OLLAMA_API_URL";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"ollama"` or `"local"` (fastembed).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "ollama".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text:latest".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// `num_ctx` passed to the backend.
    #[serde(default = "default_context_window")]
    pub context_window: u32,
    /// Messages of chat history fed into prompts and query expansion.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            context_window: default_context_window(),
            history_window: default_history_window(),
            timeout_secs: default_generation_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_generation_model() -> String {
    "huihui_ai/qwen3-abliterated:1.7b".to_string()
}
fn default_context_window() -> u32 {
    4096
}
fn default_history_window() -> usize {
    5
}
fn default_generation_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct RerankerConfig {
    /// `"local"` (fastembed cross-encoder) or `"disabled"`.
    #[serde(default = "default_reranker_provider")]
    pub provider: String,
    #[serde(default = "default_reranker_model")]
    pub model: String,
    #[serde(default = "default_rerank_batch_size")]
    pub batch_size: usize,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            provider: default_reranker_provider(),
            model: default_reranker_model(),
            batch_size: default_rerank_batch_size(),
        }
    }
}

fn default_reranker_provider() -> String {
    "local".to_string()
}
fn default_reranker_model() -> String {
    "bge-reranker-base".to_string()
}
fn default_rerank_batch_size() -> usize {
    32
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separator: default_separator(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_separator() -> String {
    "\n".to_string()
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkParams {
        ChunkParams {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            separator: self.separator.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_true")]
    pub rag_enabled: bool,
    #[serde(default = "default_true")]
    pub enable_hyde: bool,
    #[serde(default = "default_true")]
    pub enable_reranking: bool,
    #[serde(default = "default_true")]
    pub enable_graph_rag: bool,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_contexts")]
    pub max_contexts: usize,
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f64,
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,
    #[serde(default = "default_lexical_k")]
    pub lexical_k: usize,
    #[serde(default = "default_semantic_k")]
    pub semantic_k: usize,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,
    #[serde(default = "default_graph_top_k")]
    pub graph_top_k: usize,
    #[serde(default = "default_hyde_timeout_secs")]
    pub hyde_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            rag_enabled: true,
            enable_hyde: true,
            enable_reranking: true,
            enable_graph_rag: true,
            temperature: default_temperature(),
            max_contexts: default_max_contexts(),
            lexical_weight: default_lexical_weight(),
            semantic_weight: default_semantic_weight(),
            lexical_k: default_lexical_k(),
            semantic_k: default_semantic_k(),
            rrf_k: default_rrf_k(),
            graph_top_k: default_graph_top_k(),
            hyde_timeout_secs: default_hyde_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_contexts() -> usize {
    4
}
fn default_lexical_weight() -> f64 {
    0.4
}
fn default_semantic_weight() -> f64 {
    0.6
}
fn default_lexical_k() -> usize {
    4
}
fn default_semantic_k() -> usize {
    5
}
fn default_rrf_k() -> u32 {
    60
}
fn default_graph_top_k() -> usize {
    5
}
fn default_hyde_timeout_secs() -> u64 {
    30
}

/// Per-query toggles, adjustable between queries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalSettings {
    pub rag_enabled: bool,
    pub enable_hyde: bool,
    pub enable_reranking: bool,
    pub enable_graph_rag: bool,
    pub temperature: f32,
    pub max_contexts: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        RetrievalConfig::default().settings()
    }
}

impl RetrievalConfig {
    pub fn settings(&self) -> RetrievalSettings {
        RetrievalSettings {
            rag_enabled: self.rag_enabled,
            enable_hyde: self.enable_hyde,
            enable_reranking: self.enable_reranking,
            enable_graph_rag: self.enable_graph_rag,
            temperature: self.temperature,
            max_contexts: self.max_contexts,
        }
    }

    pub fn pipeline_params(&self, embed_batch_size: usize) -> Result<PipelineParams> {
        Ok(PipelineParams {
            ensemble: EnsembleParams {
                weights: EnsembleWeights::new(self.lexical_weight, self.semantic_weight)?,
                lexical_k: self.lexical_k,
                semantic_k: self.semantic_k,
                rrf_k: self.rrf_k,
            },
            embed_batch_size,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Generation options derived from current settings.
    pub fn generate_options(&self, settings: &RetrievalSettings) -> GenerateOptions {
        GenerateOptions {
            temperature: settings.temperature,
            context_window: self.generation.context_window,
        }
    }

    /// Apply environment overrides (`OLLAMA_API_URL`).
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(OLLAMA_URL_ENV) {
            if !url.trim().is_empty() {
                self.ollama.url = url.trim().trim_end_matches('/').to_string();
            }
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
        }

        if self.retrieval.max_contexts < 1 {
            bail!("retrieval.max_contexts must be >= 1");
        }
        if self.retrieval.lexical_k == 0 && self.retrieval.semantic_k == 0 {
            bail!("retrieval.lexical_k and retrieval.semantic_k cannot both be 0");
        }
        EnsembleWeights::new(self.retrieval.lexical_weight, self.retrieval.semantic_weight)
            .context("invalid retrieval weights")?;
        if !(0.0..=2.0).contains(&self.retrieval.temperature) {
            bail!("retrieval.temperature must be in [0.0, 2.0]");
        }

        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
        match self.embedding.provider.as_str() {
            "ollama" | "local" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be ollama or local.",
                other
            ),
        }
        crate::logging::parse_level(&self.logging.level).context("invalid logging.level")?;
        match self.reranker.provider.as_str() {
            "local" | "disabled" => {}
            other => bail!(
                "Unknown reranker provider: '{}'. Must be local or disabled.",
                other
            ),
        }

        Ok(())
    }
}

/// Parse and validate a config file, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let mut config = parse_config(&content)?;
    config.apply_env();
    Ok(config)
}

/// Parse and validate config text (no environment overrides).
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}
