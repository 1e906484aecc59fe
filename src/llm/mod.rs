//! LLM integration.
//!
//! Supports:
//! - **Ollama**: local models via rig-core's Ollama client
//! - **AWS**: Bedrock through its OpenAI-compatible runtime endpoint,
//!   using rig-core's OpenAI completions client
//!
//! `RigAdapter` bridges rig's `CompletionModel` trait to our `LlmProvider`.

pub mod provider;
pub mod reasoning;
mod rig_adapter;

pub use provider::*;
pub use reasoning::{ResponseGenerator, Stage};
pub use rig_adapter::RigAdapter;

use std::str::FromStr;
use std::sync::Arc;

use rig::client::{CompletionClient, Nothing};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{AgentError, LlmError};

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Aws,
    Ollama,
}

impl LlmBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Ollama => "ollama",
        }
    }
}

impl FromStr for LlmBackend {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(Self::Aws),
            "ollama" => Ok(Self::Ollama),
            _ => Err(AgentError::UnsupportedProvider {
                provider: s.to_string(),
            }),
        }
    }
}

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub model: String,
    /// Ollama server URL.
    pub ollama_url: String,
    /// AWS region for the Bedrock runtime endpoint.
    pub aws_region: String,
    /// Bedrock API key (`AWS_BEARER_TOKEN_BEDROCK`).
    pub aws_api_key: Option<SecretString>,
}

impl LlmConfig {
    /// Build a config for `backend`/`model`, reading endpoint details from the environment.
    pub fn from_env(backend: LlmBackend, model: &str) -> Self {
        Self {
            backend,
            model: model.to_string(),
            ollama_url: std::env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string()),
            aws_region: std::env::var("AWS_REGION")
                .unwrap_or_else(|_| DEFAULT_AWS_REGION.to_string()),
            aws_api_key: std::env::var("AWS_BEARER_TOKEN_BEDROCK")
                .ok()
                .map(SecretString::from),
        }
    }
}

/// Resolve `provider` and construct a model handle for `model`.
///
/// The provider name is validated before anything else, so an unsupported
/// name never reaches the network.
pub fn initialize(provider: &str, model: &str) -> Result<Arc<dyn LlmProvider>, AgentError> {
    let backend = LlmBackend::from_str(provider)?;
    let config = LlmConfig::from_env(backend, model);
    create_provider(&config).map_err(|source| AgentError::Initialization {
        provider: backend.as_str().to_string(),
        source,
    })
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.backend {
        LlmBackend::Ollama => create_ollama_provider(config),
        LlmBackend::Aws => create_bedrock_provider(config),
    }
}

fn create_ollama_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::ollama;

    let client: ollama::Client = ollama::Client::builder()
        .api_key(Nothing)
        .base_url(&config.ollama_url)
        .build()
        .map_err(|e| LlmError::ClientCreation {
            provider: "ollama".to_string(),
            reason: e.to_string(),
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!(url = %config.ollama_url, "Using Ollama (model: {})", config.model);
    Ok(Arc::new(RigAdapter::new(model, &config.model, "ollama")))
}

fn bedrock_endpoint(region: &str) -> String {
    format!("https://bedrock-runtime.{region}.amazonaws.com/openai/v1")
}

fn create_bedrock_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::openai;

    let api_key = config
        .aws_api_key
        .as_ref()
        .ok_or_else(|| LlmError::MissingCredentials {
            provider: "aws".to_string(),
            env_var: "AWS_BEARER_TOKEN_BEDROCK".to_string(),
        })?;

    let endpoint = bedrock_endpoint(&config.aws_region);
    let client: openai::CompletionsClient = openai::CompletionsClient::builder()
        .api_key(api_key.expose_secret())
        .base_url(&endpoint)
        .build()
        .map_err(|e| LlmError::ClientCreation {
            provider: "aws".to_string(),
            reason: e.to_string(),
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!(region = %config.aws_region, "Using Bedrock (model: {})", config.model);
    Ok(Arc::new(RigAdapter::new(model, &config.model, "aws")))
}
