//! Response generation — wraps an LLM provider for the draft and revise steps.

use std::sync::Arc;

use crate::agent::history::History;
use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

/// Which step of the revision loop a reply is produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Draft,
    Revise,
}

const DRAFT_INSTRUCTION: &str = "Write a first answer to the user's question. \
     Then critique it: note what is missing or unverified. \
     End with a single line of the form `Search: <query>` naming what to look up.";

const REVISE_INSTRUCTION: &str = "Revise your previous answer using the latest search results. \
     Cite the evidence you relied on and drop claims the results contradict. \
     If a search failed, say so and keep the best answer you have. \
     End with a single line of the form `Search: <query>` for anything still unverified.";

impl Stage {
    fn instruction(&self) -> &'static str {
        match self {
            Self::Draft => DRAFT_INSTRUCTION,
            Self::Revise => REVISE_INSTRUCTION,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Revise => write!(f, "revise"),
        }
    }
}

/// Produces draft and revised answers from the full history.
pub struct ResponseGenerator {
    llm: Arc<dyn LlmProvider>,
    temperature: Option<f32>,
}

impl ResponseGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Generate the assistant reply for `stage`. The history is only read.
    pub async fn generate(&self, stage: Stage, history: &History) -> Result<ChatMessage, LlmError> {
        let mut messages = history.messages().to_vec();
        messages.push(ChatMessage::system(stage.instruction()));

        let mut request = CompletionRequest::new(messages);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        let response = self.llm.complete(request).await?;
        tracing::debug!(
            %stage,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Model reply received"
        );
        Ok(ChatMessage::assistant(response.content))
    }
}
