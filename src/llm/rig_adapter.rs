//! Bridges rig-core's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel};
use rig::message::Message;

use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};

/// Wraps any rig completion model.
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    model_name: String,
    provider: &'static str,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &'static str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider,
        }
    }
}

/// Split our history into a rig preamble, prior turns, and the prompt turn.
///
/// System messages become the preamble. Tool results are folded into user
/// turns since the loop calls tools itself rather than through the model.
fn to_rig_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<Message>) {
    let mut preamble = Vec::new();
    let mut turns = Vec::new();

    for msg in messages {
        let text = msg.content.as_text();
        match msg.role {
            Role::System => preamble.push(text),
            Role::User => turns.push(Message::user(text)),
            Role::Assistant => turns.push(Message::assistant(text)),
            Role::Tool => {
                let name = msg.name.as_deref().unwrap_or("tool");
                turns.push(Message::user(format!("Result from {name}:\n{text}")));
            }
        }
    }

    let preamble = if preamble.is_empty() {
        None
    } else {
        Some(preamble.join("\n\n"))
    };
    (preamble, turns)
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let (preamble, mut turns) = to_rig_messages(&request.messages);
        let prompt = turns.pop().ok_or_else(|| LlmError::RequestFailed {
            provider: self.provider.to_string(),
            reason: "no user or assistant message to respond to".to_string(),
        })?;

        let mut builder = self.model.completion_request(prompt).messages(turns);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }

        let response = builder.send().await.map_err(|e| LlmError::RequestFailed {
            provider: self.provider.to_string(),
            reason: e.to_string(),
        })?;

        // Replies without text come back as empty content.
        let content = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(t) => Some(t.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if content.is_empty() {
            tracing::warn!(provider = self.provider, model = %self.model_name, "Model returned no text content");
        }

        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens as u32,
            output_tokens: response.usage.output_tokens as u32,
        })
    }
}
