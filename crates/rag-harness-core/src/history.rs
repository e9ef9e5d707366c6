//! Append-only chat history with a windowed view.

use crate::models::{ChatMessage, Role};

/// Ordered, append-only sequence of chat messages.
///
/// Growth is unbounded; callers that keep long-lived sessions should cap
/// them at a higher level.
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(ChatMessage::new(role, content));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last `n` messages, oldest first.
    pub fn window(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Contents of the last `n` messages joined by newlines.
    pub fn context(&self, n: usize) -> String {
        self.window(n)
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
