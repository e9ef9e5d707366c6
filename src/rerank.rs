//! Relevance scorers.
//!
//! - **[`CrossEncoderScorer`]**: a fastembed cross-encoder running in-process.
//! - **[`DisabledScorer`]**: always errors; used when no reranker is configured.
//!
//! Reranking is toggled per query through the retrieval settings; a
//! disabled scorer only matters if reranking is requested anyway, and then
//! it fails loudly instead of silently passing candidates through.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use rag_harness_core::rerank::RelevanceScorer;

use crate::config::Config;

/// A scorer that refuses to score.
pub struct DisabledScorer;

#[async_trait]
impl RelevanceScorer for DisabledScorer {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn score(&self, _query: &str, _passages: &[&str]) -> Result<Vec<f32>> {
        bail!("Reranker is disabled (set reranker.provider = \"local\")")
    }
}

/// Cross-encoder scorer backed by fastembed's `TextRerank`.
///
/// The model is loaded lazily on first use and kept for the lifetime of
/// the scorer.
#[cfg(feature = "local-fastembed")]
pub struct CrossEncoderScorer {
    model_name: String,
    model: fastembed::RerankerModel,
    batch_size: usize,
    loaded: Arc<std::sync::Mutex<Option<fastembed::TextRerank>>>,
}

#[cfg(feature = "local-fastembed")]
impl CrossEncoderScorer {
    pub fn new(model_name: &str, batch_size: usize) -> Result<Self> {
        Ok(Self {
            model_name: model_name.to_string(),
            model: reranker_model(model_name)?,
            batch_size,
            loaded: Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-fastembed")]
fn reranker_model(name: &str) -> Result<fastembed::RerankerModel> {
    match name {
        "bge-reranker-base" => Ok(fastembed::RerankerModel::BGERerankerBase),
        "bge-reranker-v2-m3" => Ok(fastembed::RerankerModel::BGERerankerV2M3),
        "jina-reranker-v1-turbo-en" => Ok(fastembed::RerankerModel::JINARerankerV1TurboEn),
        other => bail!(
            "Unknown reranker model: '{}'. Supported models: \
             bge-reranker-base, bge-reranker-v2-m3, jina-reranker-v1-turbo-en",
            other
        ),
    }
}

#[cfg(feature = "local-fastembed")]
#[async_trait]
impl RelevanceScorer for CrossEncoderScorer {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        let query = query.to_string();
        let documents: Vec<String> = passages.iter().map(|p| p.to_string()).collect();
        let model = self.model.clone();
        let batch_size = self.batch_size;
        let loaded = Arc::clone(&self.loaded);

        tokio::task::spawn_blocking(move || {
            let mut guard = loaded
                .lock()
                .map_err(|_| anyhow::anyhow!("reranker model lock poisoned"))?;
            if guard.is_none() {
                let init = fastembed::TextRerank::try_new(
                    fastembed::RerankInitOptions::new(model).with_show_download_progress(true),
                )
                .map_err(|e| anyhow::anyhow!("Failed to initialize reranker model: {}", e))?;
                *guard = Some(init);
            }
            let Some(reranker) = guard.as_mut() else {
                bail!("reranker model unavailable");
            };

            let docs: Vec<&str> = documents.iter().map(String::as_str).collect();
            let results = reranker
                .rerank(query.as_str(), docs, false, Some(batch_size))
                .map_err(|e| anyhow::anyhow!("Reranking failed: {}", e))?;

            // Results come back sorted by score; restore input order.
            let mut scores: Vec<Option<f32>> = vec![None; documents.len()];
            for r in results {
                if let Some(slot) = scores.get_mut(r.index) {
                    *slot = Some(r.score);
                }
            }
            scores
                .into_iter()
                .enumerate()
                .map(|(i, s)| s.ok_or_else(|| anyhow::anyhow!("reranker returned no score for passage {}", i)))
                .collect()
        })
        .await?
    }
}

/// Create the configured [`RelevanceScorer`].
pub fn create_scorer(config: &Config) -> Result<Arc<dyn RelevanceScorer>> {
    match config.reranker.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledScorer)),
        #[cfg(feature = "local-fastembed")]
        "local" => Ok(Arc::new(CrossEncoderScorer::new(
            &config.reranker.model,
            config.reranker.batch_size,
        )?)),
        #[cfg(not(feature = "local-fastembed"))]
        "local" => bail!("Local reranker requires --features local-fastembed"),
        other => bail!("Unknown reranker provider: {}", other),
    }
}
