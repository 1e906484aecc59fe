//! Multi-server MCP client.
//!
//! Uses the official `rmcp` SDK. Each configured server gets one running
//! client service; requests are bounded by the configured request timeout.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParam, CallToolResult, GetPromptRequestParam, RawContent};
use rmcp::service::RunningService;
use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
use rmcp::{RoleClient, ServiceError, ServiceExt};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::{CapabilityRegistry, ToolCallOutcome};
use crate::config::{RegistryConfig, ServerConfig, TransportKind};
use crate::error::RegistryError;
use crate::payload::PromptPayload;
use crate::tools::ToolDescriptor;

type McpService = RunningService<RoleClient, ()>;

/// Connected clients for every configured server.
pub struct McpRegistry {
    servers: BTreeMap<String, McpService>,
    request_timeout: Duration,
}

impl McpRegistry {
    /// Connect to every server in `config`. Fails on the first server that
    /// cannot be reached.
    pub async fn connect(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let mut servers = BTreeMap::new();
        for (name, server) in &config.servers {
            let service = connect_server(name, server, config.request_timeout).await?;
            if let Some(info) = service.peer().peer_info() {
                info!(
                    server = %name,
                    remote = %info.server_info.name,
                    version = %info.server_info.version,
                    "Connected to MCP server"
                );
            }
            servers.insert(name.clone(), service);
        }
        Ok(Self {
            servers,
            request_timeout: config.request_timeout,
        })
    }

    fn service(&self, server: &str) -> Result<&McpService, RegistryError> {
        self.servers
            .get(server)
            .ok_or_else(|| RegistryError::UnknownServer(server.to_string()))
    }

    async fn request<T, F>(&self, server: &str, fut: F) -> Result<T, RegistryError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .map_err(|_| RegistryError::Timeout {
                server: server.to_string(),
                timeout: self.request_timeout,
            })?
            .map_err(|e| classify_service_error(server, e))
    }

    /// Close every client connection.
    pub async fn shutdown(self) {
        for (name, service) in self.servers {
            if let Err(e) = service.cancel().await {
                warn!(server = %name, "Failed to shut down MCP client: {}", e);
            }
        }
    }
}

async fn connect_server(
    name: &str,
    server: &ServerConfig,
    timeout: Duration,
) -> Result<McpService, RegistryError> {
    debug!(server = %name, url = %server.url, transport = ?server.transport, "Connecting");

    let handshake = match server.transport {
        TransportKind::StreamableHttp => {
            let transport = StreamableHttpClientTransport::from_uri(server.url.as_str());
            tokio::time::timeout(timeout, ().serve(transport))
                .await
                .map(|r| r.map_err(|e| e.to_string()))
        }
        TransportKind::Stdio => {
            let mut parts = server.url.split_whitespace();
            let program = parts.next().ok_or_else(|| RegistryError::Connect {
                server: name.to_string(),
                reason: "empty command line".to_string(),
            })?;
            let mut command = tokio::process::Command::new(program);
            command.args(parts);
            let transport = TokioChildProcess::new(command).map_err(|e| RegistryError::Connect {
                server: name.to_string(),
                reason: format!("failed to spawn server process: {e}"),
            })?;
            tokio::time::timeout(timeout, ().serve(transport))
                .await
                .map(|r| r.map_err(|e| e.to_string()))
        }
    };

    match handshake {
        Ok(Ok(service)) => Ok(service),
        Ok(Err(reason)) => Err(RegistryError::Connect {
            server: name.to_string(),
            reason,
        }),
        Err(_) => Err(RegistryError::Timeout {
            server: name.to_string(),
            timeout,
        }),
    }
}

/// Protocol-level errors mean the server answered; everything else means it
/// could not be reached.
fn classify_service_error(server: &str, error: ServiceError) -> RegistryError {
    match error {
        ServiceError::McpError(data) => RegistryError::Rejected {
            server: server.to_string(),
            reason: data.message.to_string(),
        },
        other => RegistryError::Transport {
            server: server.to_string(),
            reason: other.to_string(),
        },
    }
}

fn tool_result_text(result: &CallToolResult) -> String {
    let text = result
        .content
        .iter()
        .filter_map(|c| match &c.raw {
            RawContent::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() {
        result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default()
    } else {
        text
    }
}

#[async_trait]
impl CapabilityRegistry for McpRegistry {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, RegistryError> {
        let mut tools = Vec::new();
        for (name, service) in &self.servers {
            let listed = self.request(name, service.peer().list_all_tools()).await?;
            debug!(server = %name, count = listed.len(), "Listed tools");
            tools.extend(listed.into_iter().map(|tool| ToolDescriptor {
                name: tool.name.to_string(),
                description: tool.description.map(|d| d.to_string()),
                server: name.clone(),
                input_schema: Value::Object((*tool.input_schema).clone()),
            }));
        }
        Ok(tools)
    }

    async fn get_prompt(&self, server: &str, name: &str) -> Result<PromptPayload, RegistryError> {
        let service = self.service(server)?;
        let result = self
            .request(
                server,
                service.peer().get_prompt(GetPromptRequestParam {
                    name: name.to_string(),
                    arguments: None,
                }),
            )
            .await?;

        let value =
            serde_json::to_value(&result.messages).map_err(|e| RegistryError::Rejected {
                server: server.to_string(),
                reason: format!("unreadable prompt {name}: {e}"),
            })?;
        Ok(PromptPayload::from(value))
    }

    async fn call_tool(
        &self,
        server: &str,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolCallOutcome, RegistryError> {
        let service = self.service(server)?;
        let result = self
            .request(
                server,
                service.peer().call_tool(CallToolRequestParam {
                    name: name.to_string().into(),
                    arguments: Some(arguments),
                }),
            )
            .await?;

        Ok(ToolCallOutcome {
            text: tool_result_text(&result),
            is_error: result.is_error.unwrap_or(false),
        })
    }
}
