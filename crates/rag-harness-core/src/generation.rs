//! Text generation service trait.
//!
//! Generation is streamed: a backend yields [`GenerationToken`]s and the
//! first token flagged `done` terminates the answer. The same trait backs
//! query expansion (HyDE) and final answer synthesis.

use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;

/// Sampling options forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerateOptions {
    pub temperature: f32,
    /// Context window size in tokens (`num_ctx` for Ollama).
    pub context_window: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            context_window: 4096,
        }
    }
}

/// One streamed fragment of a generated answer.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationToken {
    pub text: String,
    pub done: bool,
}

/// Stream of generated tokens.
pub type TokenStream = BoxStream<'static, Result<GenerationToken>>;

/// A text generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier.
    fn model_name(&self) -> &str;

    /// Start generating a completion for `prompt`.
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<TokenStream>;
}

/// Drain a token stream into a string, stopping at the first `done` token.
///
/// `on_token` sees every non-empty fragment as it arrives. A stream that
/// ends without a `done` token is accepted as complete.
pub async fn collect_tokens<F>(mut stream: TokenStream, mut on_token: F) -> Result<String>
where
    F: FnMut(&str) + Send,
{
    let mut answer = String::new();
    while let Some(token) = stream.next().await {
        let token = token?;
        if !token.text.is_empty() {
            on_token(&token.text);
            answer.push_str(&token.text);
        }
        if token.done {
            break;
        }
    }
    Ok(answer)
}

/// Generate a full completion without streaming callbacks.
pub async fn generate_text(
    generator: &dyn Generator,
    prompt: &str,
    options: &GenerateOptions,
) -> Result<String> {
    let stream = generator.generate(prompt, options).await?;
    collect_tokens(stream, |_| {}).await
}
