//! Conversational answering on top of the retrieval service.
//!
//! Each turn reads the recent history, retrieves context, builds a
//! structured prompt and streams the answer from the generator. Turns in
//! the same session are serialized; different sessions run concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{error, warn};

use rag_harness_core::error::PipelineState;
use rag_harness_core::generation::{collect_tokens, GenerateOptions, Generator};
use rag_harness_core::history::ChatHistory;
use rag_harness_core::models::{ChatMessage, RankedCandidate, Role};

use crate::service::{QueryOptions, RetrievalService};

/// Answer used when generation fails.
pub const GENERATION_FALLBACK: &str = "Sorry, I encountered an error during generation.";

/// Context used when retrieval fails.
pub const RETRIEVAL_FAILED_CONTEXT: &str = "Error: Could not retrieve documents.";

type SessionHandle = Arc<tokio::sync::Mutex<ChatHistory>>;

/// Chat histories keyed by session id.
#[derive(Default)]
pub struct ChatSessions {
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl ChatSessions {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, session_id: &str) -> SessionHandle {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Copy of a session's messages, oldest first.
    pub async fn messages(&self, session_id: &str) -> Vec<ChatMessage> {
        self.handle(session_id).lock().await.messages().to_vec()
    }
}

/// Render retrieved passages as numbered source lines.
pub fn format_context(candidates: &[RankedCandidate]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[Source {}]: {}", i + 1, c.passage.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The answer prompt: history, analysis steps, context, question.
pub fn build_prompt(chat_history: &str, context: &str, question: &str) -> String {
    format!(
        "Use the chat history to maintain context:
Chat History:
{chat_history}

Analyze the question and context through these steps:
1. Identify key entities and relationships
2. Check for contradictions between sources
3. Synthesize information from multiple contexts
4. Formulate a structured response

Context:
{context}

Question: {question}
Answer:"
    )
}

pub struct ChatEngine {
    service: Arc<RetrievalService>,
    generator: Arc<dyn Generator>,
    sessions: ChatSessions,
    history_window: usize,
    context_window: u32,
}

impl ChatEngine {
    pub fn new(
        service: Arc<RetrievalService>,
        generator: Arc<dyn Generator>,
        history_window: usize,
        context_window: u32,
    ) -> Self {
        Self {
            service,
            generator,
            sessions: ChatSessions::new(),
            history_window,
            context_window,
        }
    }

    pub fn sessions(&self) -> &ChatSessions {
        &self.sessions
    }

    /// Answer `question` in `session_id`, streaming fragments to `on_token`.
    ///
    /// Never fails: retrieval errors degrade to an error context line and
    /// generation errors to [`GENERATION_FALLBACK`].
    pub async fn answer<F>(&self, session_id: &str, question: &str, on_token: F) -> String
    where
        F: FnMut(&str) + Send,
    {
        let handle = self.sessions.handle(session_id);
        let mut history = handle.lock().await;

        let chat_history = history.context(self.history_window);
        history.append(Role::User, question);

        let settings = self.service.settings();
        let mut context = String::new();
        if settings.rag_enabled && self.service.state() == PipelineState::Ready {
            let options = QueryOptions {
                chat_context: Some(chat_history.clone()),
            };
            match self.service.query(question, &options).await {
                Ok(candidates) => context = format_context(&candidates),
                Err(e) => {
                    error!(error = %e, session = session_id, "retrieval failed");
                    context = RETRIEVAL_FAILED_CONTEXT.to_string();
                }
            }
        }

        let prompt = build_prompt(&chat_history, &context, question);
        let options = GenerateOptions {
            temperature: settings.temperature,
            context_window: self.context_window,
        };

        let answer = match self.generator.generate(&prompt, &options).await {
            Ok(stream) => collect_tokens(stream, on_token).await,
            Err(e) => Err(e),
        };
        let answer = answer.unwrap_or_else(|e| {
            warn!(error = %e, session = session_id, "generation failed");
            GENERATION_FALLBACK.to_string()
        });

        history.append(Role::Assistant, answer.as_str());
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_harness_core::chunk::make_passage;
    use rag_harness_core::models::CandidateOrigin;

    #[test]
    fn test_format_context_numbers_from_one() {
        let candidates: Vec<_> = ["alpha", "beta"]
            .iter()
            .enumerate()
            .map(|(i, text)| RankedCandidate {
                passage: make_passage(None, i, text.to_string()),
                score: 0.0,
                origin: CandidateOrigin::Ensemble,
            })
            .collect();
        assert_eq!(
            format_context(&candidates),
            "[Source 1]: alpha\n[Source 2]: beta"
        );
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt("hi", "[Source 1]: x", "What?");
        assert!(prompt.starts_with("Use the chat history to maintain context:\nChat History:\nhi\n"));
        assert!(prompt.contains("4. Formulate a structured response"));
        assert!(prompt.contains("Context:\n[Source 1]: x\n"));
        assert!(prompt.ends_with("Question: What?\nAnswer:"));
    }
}
