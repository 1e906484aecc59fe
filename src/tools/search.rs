//! Search tools: a registry-hosted search tool and direct SerpAPI search.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};

use super::ToolInvoker;
use crate::agent::history::History;
use crate::error::{ConfigError, RegistryError, ToolError};
use crate::llm::{ChatMessage, Role};
use crate::mcp::CapabilityRegistry;

static SEARCH_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*\**search\s*:\s*\**\s*(.+?)\s*$").expect("search line pattern is valid")
});

/// Pick the query for the next search.
///
/// Uses the last `Search: ...` line of the latest assistant message, else the
/// latest user message.
pub fn search_query(history: &History) -> String {
    let from_assistant = history.last_with_role(Role::Assistant).and_then(|msg| {
        let text = msg.content.as_text();
        SEARCH_LINE
            .captures_iter(&text)
            .last()
            .map(|c| c[1].trim_matches(|ch: char| ch == '`' || ch == '"').trim().to_string())
            .filter(|q| !q.is_empty())
    });

    from_assistant
        .or_else(|| {
            history
                .last_with_role(Role::User)
                .map(|m| m.content.as_text().trim().to_string())
        })
        .unwrap_or_default()
}

/// Calls a search tool hosted on the remote registry.
pub struct McpSearchInvoker {
    registry: Arc<dyn CapabilityRegistry>,
    server: String,
    tool: String,
}

impl McpSearchInvoker {
    pub fn new(
        registry: Arc<dyn CapabilityRegistry>,
        server: impl Into<String>,
        tool: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            server: server.into(),
            tool: tool.into(),
        }
    }
}

#[async_trait]
impl ToolInvoker for McpSearchInvoker {
    fn name(&self) -> &str {
        &self.tool
    }

    async fn invoke(&self, history: &History) -> Result<ChatMessage, ToolError> {
        let query = search_query(history);
        tracing::info!(tool = %self.tool, server = %self.server, %query, "Searching");

        let mut arguments = Map::new();
        arguments.insert("query".to_string(), Value::String(query));

        match self.registry.call_tool(&self.server, &self.tool, arguments).await {
            Ok(outcome) if outcome.is_error => {
                tracing::warn!(tool = %self.tool, "Search tool reported failure");
                Ok(ChatMessage::tool_error(&self.tool, outcome.text))
            }
            Ok(outcome) => Ok(ChatMessage::tool_result(&self.tool, outcome.text)),
            Err(RegistryError::Timeout { timeout, .. }) => Err(ToolError::Timeout {
                name: self.tool.clone(),
                timeout,
            }),
            Err(e) if e.is_transport() => Err(ToolError::Unreachable {
                name: self.tool.clone(),
                reason: e.to_string(),
            }),
            Err(e) => {
                tracing::warn!(tool = %self.tool, "Search request rejected: {}", e);
                Ok(ChatMessage::tool_error(&self.tool, e.to_string()))
            }
        }
    }
}

const SERPAPI_URL: &str = "https://serpapi.com/search.json";
const SERPAPI_TOOL_NAME: &str = "serpapi_search";
const MAX_RESULTS: usize = 5;

/// Direct Google search through SerpAPI.
pub struct SerpApiInvoker {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    timeout: Duration,
}

impl SerpApiInvoker {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: SERPAPI_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Read the key from `SERPAPI_API_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let key = std::env::var("SERPAPI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("SERPAPI_API_KEY".to_string()))?;
        Ok(Self::new(SecretString::from(key)))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Render the top organic results as plain text.
fn summarize_results(body: &Value) -> Option<String> {
    let results = body.get("organic_results")?.as_array()?;
    let lines: Vec<String> = results
        .iter()
        .take(MAX_RESULTS)
        .map(|r| {
            let field = |k: &str| r.get(k).and_then(Value::as_str).unwrap_or("");
            format!("- {} ({})\n  {}", field("title"), field("link"), field("snippet"))
        })
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

#[async_trait]
impl ToolInvoker for SerpApiInvoker {
    fn name(&self) -> &str {
        SERPAPI_TOOL_NAME
    }

    async fn invoke(&self, history: &History) -> Result<ChatMessage, ToolError> {
        let query = search_query(history);
        tracing::info!(%query, "Searching SerpAPI");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("engine", "google"),
                ("q", query.as_str()),
                ("api_key", self.api_key.expose_secret()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout {
                        name: SERPAPI_TOOL_NAME.to_string(),
                        timeout: self.timeout,
                    }
                } else {
                    ToolError::Unreachable {
                        name: SERPAPI_TOOL_NAME.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Ok(ChatMessage::tool_error(
                SERPAPI_TOOL_NAME,
                format!("search returned HTTP {status}"),
            ));
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                return Ok(ChatMessage::tool_error(
                    SERPAPI_TOOL_NAME,
                    format!("unreadable search response: {e}"),
                ));
            }
        };

        if let Some(error) = body.get("error").and_then(Value::as_str) {
            return Ok(ChatMessage::tool_error(SERPAPI_TOOL_NAME, error));
        }

        let text = summarize_results(&body)
            .unwrap_or_else(|| format!("No results found for \"{query}\""));
        Ok(ChatMessage::tool_result(SERPAPI_TOOL_NAME, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::ToolCallOutcome;
    use crate::payload::PromptPayload;
    use crate::tools::ToolDescriptor;
    use serde_json::json;
    use std::sync::Mutex;

    fn history_with_draft(draft: &str) -> History {
        History::new(vec![
            ChatMessage::system("sys"),
            ChatMessage::user("What is the capital of France?"),
        ])
        .append(ChatMessage::assistant(draft))
    }

    #[test]
    fn test_query_from_search_line() {
        let h = history_with_draft("Paris, probably.\nSearch: capital of France\n");
        assert_eq!(search_query(&h), "capital of France");
    }

    #[test]
    fn test_query_uses_last_search_line() {
        let h = history_with_draft("search: first\nmore text\n**Search:** `second query`");
        assert_eq!(search_query(&h), "second query");
    }

    #[test]
    fn test_query_falls_back_to_question() {
        let h = history_with_draft("Paris.");
        assert_eq!(search_query(&h), "What is the capital of France?");
        assert_eq!(search_query(&History::default()), "");
    }

    #[test]
    fn test_summarize_results() {
        let body = json!({"organic_results": [
            {"title": "Paris", "link": "https://en.wikipedia.org/wiki/Paris", "snippet": "Capital of France"}
        ]});
        let text = summarize_results(&body).unwrap();
        assert!(text.contains("Paris (https://en.wikipedia.org/wiki/Paris)"));
        assert!(text.contains("Capital of France"));
        assert!(summarize_results(&json!({"organic_results": []})).is_none());
    }

    /// Registry stub returning a canned call result.
    struct StubRegistry {
        outcome: Mutex<Option<Result<ToolCallOutcome, RegistryError>>>,
        seen_query: Mutex<Option<Value>>,
    }

    impl StubRegistry {
        fn new(outcome: Result<ToolCallOutcome, RegistryError>) -> Arc<Self> {
            Arc::new(Self {
                outcome: Mutex::new(Some(outcome)),
                seen_query: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl CapabilityRegistry for StubRegistry {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, RegistryError> {
            Ok(vec![])
        }
        async fn get_prompt(&self, _: &str, _: &str) -> Result<PromptPayload, RegistryError> {
            Ok(PromptPayload::from(""))
        }
        async fn call_tool(
            &self,
            _server: &str,
            _name: &str,
            arguments: Map<String, Value>,
        ) -> Result<ToolCallOutcome, RegistryError> {
            *self.seen_query.lock().unwrap() = arguments.get("query").cloned();
            self.outcome.lock().unwrap().take().unwrap()
        }
    }

    #[tokio::test]
    async fn test_mcp_search_success() {
        let registry = StubRegistry::new(Ok(ToolCallOutcome {
            text: "Paris is the capital".to_string(),
            is_error: false,
        }));
        let invoker = McpSearchInvoker::new(registry.clone(), "serpsearch", "search");
        let msg = invoker
            .invoke(&history_with_draft("Search: France capital"))
            .await
            .unwrap();

        assert!(msg.is_tool_result());
        assert!(!msg.is_error);
        assert_eq!(msg.content.as_text(), "Paris is the capital");
        assert_eq!(
            registry.seen_query.lock().unwrap().clone(),
            Some(json!("France capital"))
        );
    }

    #[tokio::test]
    async fn test_mcp_search_in_band_failures_become_messages() {
        let registry = StubRegistry::new(Ok(ToolCallOutcome {
            text: "quota exceeded".to_string(),
            is_error: true,
        }));
        let invoker = McpSearchInvoker::new(registry, "serpsearch", "search");
        let msg = invoker.invoke(&history_with_draft("x")).await.unwrap();
        assert!(msg.is_error);

        let registry = StubRegistry::new(Err(RegistryError::Rejected {
            server: "serpsearch".to_string(),
            reason: "bad query".to_string(),
        }));
        let invoker = McpSearchInvoker::new(registry, "serpsearch", "search");
        let msg = invoker.invoke(&history_with_draft("x")).await.unwrap();
        assert!(msg.is_error);
        assert!(msg.content.as_text().contains("bad query"));
    }

    #[tokio::test]
    async fn test_mcp_search_transport_failure_is_error() {
        let registry = StubRegistry::new(Err(RegistryError::Transport {
            server: "serpsearch".to_string(),
            reason: "connection closed".to_string(),
        }));
        let invoker = McpSearchInvoker::new(registry, "serpsearch", "search");
        let err = invoker.invoke(&history_with_draft("x")).await.unwrap_err();
        assert!(matches!(err, ToolError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_serpapi_unreachable_is_transport_error() {
        let invoker = SerpApiInvoker::new(SecretString::from("key"))
            .with_endpoint("http://127.0.0.1:1/search.json");
        let err = invoker.invoke(&history_with_draft("x")).await.unwrap_err();
        assert!(matches!(err, ToolError::Unreachable { .. }));
    }
}
