//! Agent module — history, the revision loop, and the session around it.

pub mod history;
pub mod revision_loop;
pub mod session;

pub use history::History;
pub use revision_loop::{LoopConfig, LoopReport, LoopState, RevisionLoop, decide};
pub use session::{AgentBinding, AgentSession, Capabilities, SessionOutcome, discover_capabilities};

use std::sync::Arc;

use crate::config::{AgentConfig, SearchBackend};
use crate::error::{AgentError, DiscoveryStage};
use crate::llm::{self, ResponseGenerator};
use crate::mcp::{CapabilityRegistry, McpRegistry};
use crate::tools::{McpSearchInvoker, SerpApiInvoker, ToolInvoker};

/// Answer `question` with `model` on `provider`.
///
/// Resolves the model, connects to the configured registry, loads tools and
/// seed prompts, then runs one revision loop. Nothing touches the network if
/// the provider name is unsupported.
pub async fn ask(
    config: &AgentConfig,
    model: &str,
    provider: &str,
    question: &str,
    memory: Option<&str>,
) -> Result<String, AgentError> {
    let llm = llm::initialize(provider, model)?;
    tracing::info!(model = %llm.model_name(), %provider, "LLM initialized");

    tracing::info!(servers = config.registry.servers.len(), "Connecting to tool and prompt servers");
    let registry = McpRegistry::connect(&config.registry).await.map_err(|source| {
        tracing::error!(error = %source, "Failed to connect to tool and prompt servers");
        AgentError::Discovery {
            stage: DiscoveryStage::Connect,
            source,
        }
    })?;
    let registry = Arc::new(registry);

    let answer = run_with_registry(config, llm, registry.clone(), question, memory).await;

    if let Some(registry) = Arc::into_inner(registry) {
        registry.shutdown().await;
    }
    answer
}

/// Discover tools and prompts on `registry`, then answer `question` with `llm`.
///
/// With the `mcp` search backend, searches are sent to the discovered tool on
/// the same registry.
pub async fn run_with_registry(
    config: &AgentConfig,
    llm: Arc<dyn llm::LlmProvider>,
    registry: Arc<dyn CapabilityRegistry>,
    question: &str,
    memory: Option<&str>,
) -> Result<String, AgentError> {
    let capabilities = discover_capabilities(registry.as_ref(), &config.prompt_server).await?;

    let tool: Arc<dyn ToolInvoker> = match config.search_backend {
        SearchBackend::Mcp => {
            let descriptor = capabilities
                .tools
                .resolve(config.search_tool.as_deref(), &config.prompt_server)
                .map_err(|source| AgentError::Discovery {
                    stage: DiscoveryStage::ListTools,
                    source,
                })?;
            Arc::new(McpSearchInvoker::new(
                Arc::clone(&registry),
                descriptor.server.clone(),
                descriptor.name.clone(),
            ))
        }
        SearchBackend::SerpApi => Arc::new(SerpApiInvoker::from_env()?),
    };

    let mut generator = ResponseGenerator::new(Arc::clone(&llm));
    if let Some(temperature) = config.temperature {
        generator = generator.with_temperature(temperature);
    }

    let session = AgentSession::with_generator(
        generator,
        AgentBinding { llm, capabilities },
        tool,
        LoopConfig {
            max_iterations: config.max_iterations,
        },
    );
    session.run(question, memory).await
}
