//! Tool seam consumed by the revision loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::history::History;
use crate::error::ToolError;
use crate::llm::ChatMessage;

/// A tool advertised by a remote server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
    /// Logical name of the server that offers the tool.
    pub server: String,
    pub input_schema: serde_json::Value,
}

/// Runs one tool call against the current history.
///
/// Implementations return a tool-role message. A tool that ran but failed
/// must come back as `Ok(ChatMessage::tool_error(..))` so the revise step can
/// see it; `Err` is reserved for the tool being unreachable.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Name reported on produced messages.
    fn name(&self) -> &str;

    async fn invoke(&self, history: &History) -> Result<ChatMessage, ToolError>;
}
