//! Hypothetical Document Embedding (HyDE) query expansion.
//!
//! Asks the generator for a hypothetical answer and appends it to the
//! query, so lexical and semantic retrieval see answer-shaped text. Any
//! failure falls back to the raw query; expansion never errors.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use rag_harness_core::generation::{generate_text, GenerateOptions, Generator};

pub struct QueryExpander {
    generator: Arc<dyn Generator>,
    timeout: Duration,
}

impl QueryExpander {
    pub fn new(generator: Arc<dyn Generator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Expand `query`, using `chat_context` (recent history) when non-empty.
    ///
    /// Returns `query` unchanged when `enabled` is false or generation
    /// fails, times out, or produces nothing.
    pub async fn expand(
        &self,
        query: &str,
        chat_context: Option<&str>,
        enabled: bool,
        options: &GenerateOptions,
    ) -> String {
        if !enabled {
            return query.to_string();
        }

        let input = match chat_context {
            Some(ctx) if !ctx.is_empty() => format!("{ctx}\n{query}"),
            _ => query.to_string(),
        };
        let prompt = format!("Generate a hypothetical answer to: {input}");

        let answer = tokio::time::timeout(
            self.timeout,
            generate_text(self.generator.as_ref(), &prompt, options),
        )
        .await;

        match answer {
            Ok(Ok(answer)) if !answer.trim().is_empty() => {
                debug!(answer_chars = answer.len(), "query expanded");
                format!("{input}\n{answer}")
            }
            Ok(Ok(_)) => {
                warn!("query expansion returned an empty answer; using raw query");
                query.to_string()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "query expansion failed; using raw query");
                query.to_string()
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs_f64(),
                    "query expansion timed out; using raw query"
                );
                query.to_string()
            }
        }
    }
}
