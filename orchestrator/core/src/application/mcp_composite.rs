// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! MCP Composite Client Application Service (§4.2).
//!
//! Presents N underlying MCP sub-clients (HTTP or stdio, `infrastructure::mcp`)
//! as one tool surface: starts each at construction, builds the
//! `tool_name -> sub_client` routing table, and rejects the whole composite
//! if any two sub-clients advertise the same tool name.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, info, instrument};

use crate::domain::context::Context;
use crate::domain::mcp::{McpSubClient, MCPError, MCP_CALL_TIMEOUT_SECS};
use crate::domain::tool::ToolDescriptor;
use crate::domain::OrchestratorError;

/// Aggregates MCP sub-clients behind one `tool_name -> sub_client` routing
/// table. Lookup is mutex-guarded but released before dispatch, so calls to
/// different sub-clients proceed concurrently (§4.2, §5).
pub struct McpComposite {
    sub_clients: Vec<Arc<dyn McpSubClient>>,
    routes: Mutex<HashMap<String, usize>>,
    tools: Vec<ToolDescriptor>,
}

impl McpComposite {
    /// Start every sub-client, build the routing table, and tag each tool
    /// with its server name. On a duplicate tool name, stop every sub-client
    /// started so far and fail (§4.2 step 2, §7 `DuplicateToolError`).
    #[instrument(skip_all, fields(sub_client_count = sub_clients.len()))]
    pub async fn start(sub_clients: Vec<Arc<dyn McpSubClient>>) -> Result<Self, OrchestratorError> {
        let mut routes: HashMap<String, usize> = HashMap::new();
        let mut tools = Vec::new();

        for (idx, client) in sub_clients.iter().enumerate() {
            let server_name = client.server_name().to_string();
            let listed = client.list_tools().await?;

            for mut tool in listed {
                tool.server = server_name.clone();
                if let Some(&existing_idx) = routes.get(&tool.name) {
                    let first_server = sub_clients[existing_idx].server_name().to_string();
                    error!(
                        tool = %tool.name,
                        first_server = %first_server,
                        second_server = %server_name,
                        "duplicate tool name across MCP servers"
                    );
                    Self::stop_all(&sub_clients[..=idx]).await;
                    return Err(OrchestratorError::DuplicateTool {
                        tool_name: tool.name,
                        first_server,
                        second_server: server_name,
                    });
                }
                routes.insert(tool.name.clone(), idx);
                tools.push(tool);
            }
            info!(server = %server_name, "MCP sub-client started");
        }

        Ok(Self {
            sub_clients,
            routes: Mutex::new(routes),
            tools,
        })
    }

    async fn stop_all(clients: &[Arc<dyn McpSubClient>]) {
        for client in clients {
            if let Err(e) = client.stop().await {
                error!(server = %client.server_name(), error = %e, "error stopping MCP sub-client");
            }
        }
    }

    /// The full tool surface aggregated across every sub-client (§6 `GET /tools`).
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Route and dispatch a tool call (§4.2). Unknown tool name surfaces as
    /// `ToolNotFoundError`; non-2xx authentication failures surface
    /// unchanged as `AuthRequiredError` via `From<MCPError>`.
    #[instrument(skip(self, args, ctx), fields(tool = %tool_name))]
    pub async fn call(
        &self,
        tool_name: &str,
        args: serde_json::Value,
        ctx: &Context,
    ) -> Result<serde_json::Value, OrchestratorError> {
        let idx = {
            let routes = self.routes.lock();
            *routes
                .get(tool_name)
                .ok_or_else(|| MCPError::ToolNotFound(tool_name.to_string()))?
        };
        let client = self.sub_clients[idx].clone();

        tokio::select! {
            _ = ctx.cancellation.cancelled() => Err(OrchestratorError::Cancelled),
            result = tokio::time::timeout(
                Duration::from_secs(MCP_CALL_TIMEOUT_SECS),
                client.call(tool_name, args, ctx),
            ) => match result {
                Ok(result) => Ok(result?),
                Err(_) => Err(MCPError::Timeout(MCP_CALL_TIMEOUT_SECS).into()),
            },
        }
    }

    /// Stop every sub-client. Errors are collected via logging, not
    /// propagated eagerly (§4.2 Shutdown).
    pub async fn shutdown(&self) {
        Self::stop_all(&self.sub_clients).await;
    }
}
