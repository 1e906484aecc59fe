//! Agent session — capability discovery, seed history, and answer extraction
//! around one revision loop run.

use std::sync::Arc;

use crate::agent::history::History;
use crate::agent::revision_loop::{LoopConfig, LoopReport, RevisionLoop};
use crate::error::{AgentError, DiscoveryStage, ExtractionError, RegistryError};
use crate::llm::{ChatMessage, LlmProvider, ResponseGenerator};
use crate::mcp::CapabilityRegistry;
use crate::payload::{PromptPayload, coerce_to_text, join_parts};
use crate::tools::{ToolInvoker, ToolRegistry};

pub const SECURITY_PROMPT: &str = "security_prompt";
pub const SYSTEM_PROMPT: &str = "system_prompt";

/// Returned when the final message cannot be read as text.
pub const NO_ANSWER_PLACEHOLDER: &str = "No answer could be extracted from the agent response.";

/// Tools and seed prompts fetched from the registry.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub tools: ToolRegistry,
    pub security_prompt: String,
    pub system_prompt: String,
}

fn discovery_error(stage: DiscoveryStage, source: RegistryError) -> AgentError {
    tracing::error!(%stage, error = %source, "Failed to load tools or prompts");
    AgentError::Discovery { stage, source }
}

/// Fetch the tool set and both seed prompts. Any single failure fails the whole step.
pub async fn discover_capabilities(
    registry: &dyn CapabilityRegistry,
    prompt_server: &str,
) -> Result<Capabilities, AgentError> {
    tracing::info!(%prompt_server, "Loading tools and prompts");

    let tools: ToolRegistry = registry
        .list_tools()
        .await
        .map_err(|e| discovery_error(DiscoveryStage::ListTools, e))?
        .into_iter()
        .collect();
    if tools.is_empty() {
        return Err(discovery_error(DiscoveryStage::ListTools, RegistryError::NoTools));
    }

    let security_prompt = registry
        .get_prompt(prompt_server, SECURITY_PROMPT)
        .await
        .map_err(|e| discovery_error(DiscoveryStage::SecurityPrompt, e))?;
    let system_prompt = registry
        .get_prompt(prompt_server, SYSTEM_PROMPT)
        .await
        .map_err(|e| discovery_error(DiscoveryStage::SystemPrompt, e))?;

    tracing::info!(tools = ?tools.list(), "Loaded tools");

    Ok(Capabilities {
        tools,
        security_prompt: coerce_to_text(&security_prompt),
        system_prompt: coerce_to_text(&system_prompt),
    })
}

/// A model handle bound to the session's capabilities.
pub struct AgentBinding {
    pub llm: Arc<dyn LlmProvider>,
    pub capabilities: Capabilities,
}

/// Final text of the last message in `history`.
///
/// Multi-part content is joined with newlines. Blank text counts as no text.
pub fn extract_answer(history: &History) -> Result<String, ExtractionError> {
    let last = history.last().ok_or(ExtractionError::EmptyHistory)?;
    let value = serde_json::to_value(&last.content).map_err(|_| ExtractionError::NoText)?;
    let text = match PromptPayload::from(value) {
        PromptPayload::Text(text) => text,
        parts => join_parts(&parts),
    };
    if text.trim().is_empty() {
        Err(ExtractionError::NoText)
    } else {
        Ok(text)
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub answer: String,
    pub history: History,
    pub report: LoopReport,
}

/// One question-answering session.
pub struct AgentSession {
    binding: AgentBinding,
    revision_loop: RevisionLoop,
}

impl AgentSession {
    pub fn new(binding: AgentBinding, tool: Arc<dyn ToolInvoker>, config: LoopConfig) -> Self {
        Self::with_generator(
            ResponseGenerator::new(Arc::clone(&binding.llm)),
            binding,
            tool,
            config,
        )
    }

    /// Use a pre-configured generator (e.g. with a temperature) for the model calls.
    pub fn with_generator(
        generator: ResponseGenerator,
        binding: AgentBinding,
        tool: Arc<dyn ToolInvoker>,
        config: LoopConfig,
    ) -> Self {
        Self {
            revision_loop: RevisionLoop::new(generator, tool, config),
            binding,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.binding.capabilities
    }

    /// `[security, system, memory?, question]`.
    pub fn seed_history(&self, question: &str, memory: Option<&str>) -> History {
        let caps = &self.binding.capabilities;
        let mut seed = vec![
            ChatMessage::system(caps.security_prompt.as_str()),
            ChatMessage::system(caps.system_prompt.as_str()),
        ];
        if let Some(memory) = memory {
            seed.push(ChatMessage::system(memory));
        }
        seed.push(ChatMessage::user(question));
        History::new(seed)
    }

    /// Answer `question`, returning the history and counters alongside the text.
    pub async fn run_detailed(
        &self,
        question: &str,
        memory: Option<&str>,
    ) -> Result<SessionOutcome, AgentError> {
        let seed = self.seed_history(question, memory);
        let (history, report) = self.revision_loop.run(seed).await?;

        let answer = match extract_answer(&history) {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(error = %e, "Could not extract answer; returning placeholder");
                NO_ANSWER_PLACEHOLDER.to_string()
            }
        };

        Ok(SessionOutcome {
            answer,
            history,
            report,
        })
    }

    /// Answer `question`.
    pub async fn run(&self, question: &str, memory: Option<&str>) -> Result<String, AgentError> {
        let outcome = self.run_detailed(question, memory).await?;
        tracing::info!(answer_len = outcome.answer.len(), "Agent response ready");
        Ok(outcome.answer)
    }
}
