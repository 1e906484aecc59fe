//! Configuration types.
//!
//! Everything can be set via environment variables:
//! - `AGENT_MAX_ITERATIONS` - Bound on search rounds. Defaults to `2`.
//! - `AGENT_PROMPT_SERVER` - Server that serves the seed prompts. Defaults to `promptgen`.
//! - `AGENT_SEARCH_TOOL` - Tool to search with. Defaults to the first discovered tool.
//! - `AGENT_SEARCH_BACKEND` - `mcp` (default) or `serpapi`.
//! - `AGENT_TEMPERATURE` - Optional sampling temperature for draft and revise calls.
//! - `REGISTRY_CONFIG` - Path to a JSON file mapping server names to `{url, transport}`.
//! - `REGISTRY_TIMEOUT_SECS` - Per-request timeout for registry calls. Defaults to `60`.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How a registry server is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[serde(alias = "streamable-http")]
    StreamableHttp,
    /// `url` is the command line of a server process speaking on stdio.
    Stdio,
}

/// One remote tool/prompt server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub url: String,
    pub transport: TransportKind,
}

/// The set of servers a session discovers tools and prompts from.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    pub servers: BTreeMap<String, ServerConfig>,
    pub request_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        let mut servers = BTreeMap::new();
        servers.insert(
            "serpsearch".to_string(),
            ServerConfig {
                url: "http://localhost:8001/mcp/".to_string(),
                transport: TransportKind::StreamableHttp,
            },
        );
        servers.insert(
            "promptgen".to_string(),
            ServerConfig {
                url: "http://localhost:8002/mcp/".to_string(),
                transport: TransportKind::StreamableHttp,
            },
        );
        Self {
            servers,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl RegistryConfig {
    /// Parse a server map from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let servers: BTreeMap<String, ServerConfig> =
            serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        if servers.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "REGISTRY_CONFIG".to_string(),
                message: "no servers configured".to_string(),
            });
        }
        Ok(Self {
            servers,
            ..Self::default()
        })
    }

    /// Load a server map from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Where search results come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackend {
    /// A tool discovered on the registry.
    Mcp,
    /// SerpAPI over HTTP.
    SerpApi,
}

impl FromStr for SearchBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mcp" => Ok(Self::Mcp),
            "serpapi" => Ok(Self::SerpApi),
            other => Err(ConfigError::InvalidValue {
                key: "AGENT_SEARCH_BACKEND".to_string(),
                message: format!("expected 'mcp' or 'serpapi', got '{other}'"),
            }),
        }
    }
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Search rounds allowed before the loop is forced to stop.
    pub max_iterations: usize,
    /// Server that serves `security_prompt` and `system_prompt`.
    pub prompt_server: String,
    /// Tool to search with; `None` picks the first discovered tool.
    pub search_tool: Option<String>,
    pub search_backend: SearchBackend,
    pub temperature: Option<f32>,
    pub registry: RegistryConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2,
            prompt_server: "promptgen".to_string(),
            search_tool: None,
            search_backend: SearchBackend::Mcp,
            temperature: None,
            registry: RegistryConfig::default(),
        }
    }
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

impl AgentConfig {
    /// Build configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut registry = match std::env::var("REGISTRY_CONFIG") {
            Ok(path) => RegistryConfig::from_file(Path::new(&path))?,
            Err(_) => defaults.registry,
        };
        if let Some(secs) = parse_env::<u64>("REGISTRY_TIMEOUT_SECS")? {
            registry = registry.with_request_timeout(Duration::from_secs(secs));
        }

        let search_backend = match std::env::var("AGENT_SEARCH_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.search_backend,
        };

        Ok(Self {
            max_iterations: parse_env("AGENT_MAX_ITERATIONS")?.unwrap_or(defaults.max_iterations),
            prompt_server: std::env::var("AGENT_PROMPT_SERVER")
                .unwrap_or(defaults.prompt_server),
            search_tool: std::env::var("AGENT_SEARCH_TOOL").ok(),
            search_backend,
            temperature: parse_env("AGENT_TEMPERATURE")?,
            registry,
        })
    }
}
