//! Streaming text generation against Ollama's `/api/generate`.
//!
//! The endpoint answers with newline-delimited JSON objects, each carrying a
//! `response` fragment; the last one has `"done": true`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;

use rag_harness_core::generation::{GenerateOptions, GenerationToken, Generator, TokenStream};

use crate::config::Config;
use crate::ollama::OllamaClient;

pub struct OllamaGenerator {
    client: OllamaClient,
    model: String,
}

impl OllamaGenerator {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Generator for `[generation].model` at `[ollama].url`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = OllamaClient::new(
            &config.ollama.url,
            Duration::from_secs(config.generation.timeout_secs),
            config.generation.max_retries,
        )?;
        Ok(Self::new(client, config.generation.model.clone()))
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<TokenStream> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": true,
            "options": {
                "temperature": options.temperature,
                "num_ctx": options.context_window,
            },
        });

        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "starting generation");
        let response = self.client.post_json("/api/generate", &body).await?;

        let stream = async_stream::stream! {
            let mut bytes_stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk_result) = bytes_stream.next().await {
                match chunk_result {
                    Ok(bytes) => {
                        buffer.extend_from_slice(&bytes);

                        while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                            let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
                            match parse_generate_line(&line) {
                                Ok(Some(token)) => yield Ok(token),
                                Ok(None) => {}
                                Err(e) => {
                                    yield Err(e);
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(anyhow::anyhow!("Ollama stream interrupted: {}", e));
                        return;
                    }
                }
            }

            if !buffer.is_empty() {
                match parse_generate_line(&buffer) {
                    Ok(Some(token)) => yield Ok(token),
                    Ok(None) => {}
                    Err(e) => yield Err(e),
                }
            }
        };

        Ok(stream.boxed())
    }
}

/// Parse one NDJSON line from `/api/generate`.
///
/// Blank lines yield `None`. A line carrying an `error` field is an error.
pub fn parse_generate_line(line: &[u8]) -> Result<Option<GenerationToken>> {
    let text = std::str::from_utf8(line)?.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let json: serde_json::Value = serde_json::from_str(text)?;
    if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
        bail!("Ollama generation error: {}", err);
    }

    Ok(Some(GenerationToken {
        text: json
            .get("response")
            .and_then(|r| r.as_str())
            .unwrap_or_default()
            .to_string(),
        done: json.get("done").and_then(|d| d.as_bool()).unwrap_or(false),
    }))
}
