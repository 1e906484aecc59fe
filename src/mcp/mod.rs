//! Remote tool/prompt registry.
//!
//! The session only needs three things from the registry: the tool list, a
//! named prompt from a named server, and a way to call a tool. `McpRegistry`
//! provides them over MCP using the `rmcp` client.

pub mod client;

pub use client::McpRegistry;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::RegistryError;
use crate::payload::PromptPayload;
use crate::tools::ToolDescriptor;

/// Result of a tool call the server answered.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallOutcome {
    pub text: String,
    /// The server ran the tool and reports failure.
    pub is_error: bool,
}

/// What a session consumes from the remote registry.
#[async_trait]
pub trait CapabilityRegistry: Send + Sync {
    /// Every tool offered by every configured server.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, RegistryError>;

    /// Fetch a prompt by server and name, in whatever shape the server returns it.
    async fn get_prompt(&self, server: &str, name: &str) -> Result<PromptPayload, RegistryError>;

    async fn call_tool(
        &self,
        server: &str,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolCallOutcome, RegistryError>;
}
