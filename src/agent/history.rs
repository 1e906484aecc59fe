//! Append-only conversation history threaded through the revision loop.

use crate::llm::{ChatMessage, Role};

/// Ordered message history for one loop run.
///
/// The only way to change a `History` is [`History::append`], which consumes
/// the value and returns it extended by one message. Existing entries are
/// never removed, reordered, or edited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    messages: Vec<ChatMessage>,
}

impl History {
    /// Start a history from seed messages.
    pub fn new(seed: Vec<ChatMessage>) -> Self {
        Self { messages: seed }
    }

    /// Return this history with `message` appended.
    #[must_use]
    pub fn append(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
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

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Number of tool-result messages seen so far.
    pub fn tool_result_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_tool_result()).count()
    }

    /// Most recent message with the given role.
    pub fn last_with_role(&self, role: Role) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| m.role == role)
    }

    /// Whether `self` starts with every message of `earlier`, in order.
    pub fn extends(&self, earlier: &History) -> bool {
        self.messages.starts_with(&earlier.messages)
    }
}
