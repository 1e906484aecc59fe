//! Draft → search → revise state machine.

use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use crate::agent::history::History;
use crate::error::AgentError;
use crate::llm::{ResponseGenerator, Role, Stage};
use crate::tools::ToolInvoker;

/// Where the loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopState {
    Draft,
    ToolCall,
    Revise,
    Terminated,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::ToolCall => "tool_call",
            Self::Revise => "revise",
            Self::Terminated => "terminated",
        };
        write!(f, "{s}")
    }
}

/// Loop bound, fixed for the lifetime of a [`RevisionLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    pub max_iterations: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self { max_iterations: 2 }
    }
}

/// Routing after a revise step.
///
/// Stops once the history holds more than `max_iterations` tool results, so
/// a full run makes `max_iterations + 1` tool calls.
pub fn decide(history: &History, config: &LoopConfig) -> LoopState {
    if history.tool_result_count() > config.max_iterations {
        LoopState::Terminated
    } else {
        LoopState::ToolCall
    }
}

/// The state that follows `state` once its node has run on `history`.
pub fn next_state(state: LoopState, history: &History, config: &LoopConfig) -> LoopState {
    match state {
        LoopState::Draft => LoopState::ToolCall,
        LoopState::ToolCall => LoopState::Revise,
        LoopState::Revise => decide(history, config),
        LoopState::Terminated => LoopState::Terminated,
    }
}

/// Counters for one completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopReport {
    pub model_calls: usize,
    pub tool_calls: usize,
    pub history_len: usize,
}

/// Runs the state machine over a seed history.
pub struct RevisionLoop {
    generator: ResponseGenerator,
    tool: Arc<dyn ToolInvoker>,
    config: LoopConfig,
}

impl RevisionLoop {
    pub fn new(generator: ResponseGenerator, tool: Arc<dyn ToolInvoker>, config: LoopConfig) -> Self {
        Self {
            generator,
            tool,
            config,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Run from `Draft` until `Terminated`, returning the final history.
    ///
    /// Model errors and tool transport errors abort the run. Tool failures
    /// reported in-band are just another tool-result message.
    pub async fn run(&self, seed: History) -> Result<(History, LoopReport), AgentError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("revision_loop", %run_id, model = %self.generator.model_name());
        self.run_inner(seed).instrument(span).await
    }

    async fn run_inner(&self, seed: History) -> Result<(History, LoopReport), AgentError> {
        tracing::info!(
            seed_len = seed.len(),
            max_iterations = self.config.max_iterations,
            tool = %self.tool.name(),
            "Starting revision loop"
        );

        let mut report = LoopReport::default();
        let mut history = seed;
        let mut state = LoopState::Draft;

        while !state.is_terminal() {
            let before = history.len();
            history = match state {
                LoopState::Draft => {
                    report.model_calls += 1;
                    self.respond(Stage::Draft, history).await?
                }
                LoopState::ToolCall => {
                    report.tool_calls += 1;
                    self.call_tool(history).await?
                }
                LoopState::Revise => {
                    report.model_calls += 1;
                    self.respond(Stage::Revise, history).await?
                }
                LoopState::Terminated => history,
            };
            debug_assert_eq!(history.len(), before + 1, "each node appends exactly one message");

            let next = next_state(state, &history, &self.config);
            tracing::debug!(
                from = %state,
                to = %next,
                tool_results = history.tool_result_count(),
                history_len = history.len(),
                "Loop transition"
            );
            state = next;
        }

        report.history_len = history.len();
        tracing::info!(
            model_calls = report.model_calls,
            tool_calls = report.tool_calls,
            history_len = report.history_len,
            "Revision loop finished"
        );
        Ok((history, report))
    }

    async fn respond(&self, stage: Stage, history: History) -> Result<History, AgentError> {
        let reply = self.generator.generate(stage, &history).await?;
        Ok(history.append(reply))
    }

    async fn call_tool(&self, history: History) -> Result<History, AgentError> {
        let mut result = self
            .tool
            .invoke(&history)
            .await
            .map_err(AgentError::ToolTransport)?;

        // The tool count drives termination, so the appended message must be a tool result.
        if result.role != Role::Tool {
            tracing::warn!(role = %result.role, "Tool returned a non-tool message; retagging");
            result.role = Role::Tool;
        }
        if result.is_error {
            tracing::warn!(tool = %self.tool.name(), "Tool reported failure; continuing to revise");
        }
        Ok(history.append(result))
    }
}
