//! Error types for the revision agent.

use std::time::Duration;

/// Top-level error type for an agent run.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Unsupported LLM provider '{provider}'. Choose 'aws' or 'ollama'.")]
    UnsupportedProvider { provider: String },

    #[error("Failed to initialize LLM for provider {provider}: {source}")]
    Initialization {
        provider: String,
        #[source]
        source: LlmError,
    },

    #[error("Failed to load tools or prompts ({stage}): {source}")]
    Discovery {
        stage: DiscoveryStage,
        #[source]
        source: RegistryError,
    },

    #[error("Tool transport failed: {0}")]
    ToolTransport(#[source] ToolError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Which discovery fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStage {
    Connect,
    ListTools,
    SecurityPrompt,
    SystemPrompt,
}

impl std::fmt::Display for DiscoveryStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connect => "connect",
            Self::ListTools => "list_tools",
            Self::SecurityPrompt => "security_prompt",
            Self::SystemPrompt => "system_prompt",
        };
        write!(f, "{s}")
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Missing credentials for provider {provider}: set {env_var}")]
    MissingCredentials { provider: String, env_var: String },

    #[error("Failed to create {provider} client: {reason}")]
    ClientCreation { provider: String, reason: String },
}

/// Errors raised while invoking a tool from inside the loop.
///
/// Only transport failures travel as errors. A tool that ran and reported a
/// failure is encoded as an error tool-result message instead.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool {name} unreachable: {reason}")]
    Unreachable { name: String, reason: String },

    #[error("Tool {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },
}

/// Remote tool/prompt registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Failed to connect to server {server}: {reason}")]
    Connect { server: String, reason: String },

    #[error("Unknown server: {0}")]
    UnknownServer(String),

    #[error("Request to server {server} timed out after {timeout:?}")]
    Timeout { server: String, timeout: Duration },

    #[error("Transport error on server {server}: {reason}")]
    Transport { server: String, reason: String },

    #[error("Server {server} rejected request: {reason}")]
    Rejected { server: String, reason: String },

    #[error("No tools available from any configured server")]
    NoTools,

    #[error("Tool {0} is not offered by any configured server")]
    UnknownTool(String),
}

impl RegistryError {
    /// Whether this error means the server could not be reached at all,
    /// as opposed to the server answering with a failure.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Timeout { .. } | Self::Transport { .. }
        )
    }
}

/// Final-message content could not be turned into text.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("History is empty")]
    EmptyHistory,

    #[error("Final message has no text content")]
    NoText,
}

/// Result type alias for agent runs.
pub type Result<T> = std::result::Result<T, AgentError>;
