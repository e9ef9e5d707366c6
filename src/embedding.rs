//! Embedding backends.
//!
//! Concrete [`Embedder`] implementations:
//! - **[`OllamaEmbedder`]**: calls an Ollama instance's `/api/embed` endpoint.
//! - **[`LocalEmbedder`]**: runs models locally via fastembed; no network
//!   calls after the first model download.
//!
//! Use [`create_embedder`] to pick one from configuration.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use rag_harness_core::embedding::Embedder;

use crate::config::Config;
use crate::ollama::OllamaClient;

// ============ Ollama ============

/// Embedder backed by a local Ollama instance.
///
/// Requires Ollama to be running with the embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let response = self.client.post_json("/api/embed", &body).await?;
        let json: serde_json::Value = response.json().await?;
        parse_embed_response(&json)
    }
}

/// Extract the `embeddings` array from an `/api/embed` response.
pub fn parse_embed_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    let mut result = Vec::with_capacity(embeddings.len());

    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: embedding is not an array"))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    Ok(result)
}

// ============ Local (fastembed) ============

/// Embedder running a fastembed model in-process.
///
/// The model is downloaded on first use from Hugging Face and cached, then
/// kept loaded for the lifetime of the embedder. Inference runs on the
/// blocking thread pool.
#[cfg(feature = "local-fastembed")]
pub struct LocalEmbedder {
    model_name: String,
    model: fastembed::EmbeddingModel,
    batch_size: usize,
    loaded: Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-fastembed")]
impl LocalEmbedder {
    pub fn new(model_name: &str, batch_size: usize) -> Result<Self> {
        Ok(Self {
            model_name: model_name.to_string(),
            model: local_model(model_name)?,
            batch_size,
            loaded: Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-fastembed")]
fn local_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base",
            other
        ),
    }
}

#[cfg(feature = "local-fastembed")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let texts = texts.to_vec();
        let model = self.model.clone();
        let batch_size = self.batch_size;
        let loaded = Arc::clone(&self.loaded);

        tokio::task::spawn_blocking(move || {
            let mut guard = loaded
                .lock()
                .map_err(|_| anyhow::anyhow!("local embedding model lock poisoned"))?;
            if guard.is_none() {
                let init = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(model).with_show_download_progress(true),
                )
                .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {}", e))?;
                *guard = Some(init);
            }
            let Some(embedder) = guard.as_mut() else {
                bail!("local embedding model unavailable");
            };
            embedder
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))
        })
        .await?
    }
}

/// Create the configured [`Embedder`].
///
/// | `embedding.provider` | Backend |
/// |----------------------|---------|
/// | `"ollama"` | [`OllamaEmbedder`] at `ollama.url` |
/// | `"local"` | `LocalEmbedder` (requires the `local-fastembed` feature) |
pub fn create_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let emb = &config.embedding;
    match emb.provider.as_str() {
        "ollama" => {
            let client = OllamaClient::new(
                &config.ollama.url,
                Duration::from_secs(emb.timeout_secs),
                emb.max_retries,
            )?;
            Ok(Arc::new(OllamaEmbedder::new(client, emb.model.clone())))
        }
        #[cfg(feature = "local-fastembed")]
        "local" => Ok(Arc::new(LocalEmbedder::new(&emb.model, emb.batch_size)?)),
        #[cfg(not(feature = "local-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-fastembed"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
