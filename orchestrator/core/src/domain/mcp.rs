// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! MCP domain types: sub-client configuration and the composite's errors.
//! The composite itself (routing, dispatch, startup aggregation) lives in
//! `application::mcp_composite`; this module holds only the shapes it's
//! built from and the errors it raises.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::context::Context;
use crate::domain::tool::ToolDescriptor;

/// Per-call timeout for an MCP sub-client dispatch (§4.2).
pub const MCP_CALL_TIMEOUT_SECS: u64 = 30;

/// One underlying MCP connection, either Streamable HTTP or subprocess
/// stdio (§6). The composite (`application::mcp_composite::McpComposite`)
/// holds N of these behind this shared contract; implementations live under
/// `infrastructure::mcp`.
#[async_trait]
pub trait McpSubClient: Send + Sync {
    /// The configured server name this sub-client was built from.
    fn server_name(&self) -> &str;

    /// Run `initialize` then `tools/list`; called once at composite startup.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, MCPError>;

    /// Run `tools/call` against this sub-client. HTTP sub-clients inject
    /// `ctx`'s bearer token and session id as headers (§4.2); stdio
    /// sub-clients ignore it.
    async fn call(&self, tool_name: &str, args: Value, ctx: &Context) -> Result<Value, MCPError>;

    /// Stop the sub-client (close HTTP connections / kill the subprocess).
    async fn stop(&self) -> Result<(), MCPError>;
}

/// One configured MCP server, either reached over Streamable HTTP or spawned
/// as a local subprocess speaking line-delimited JSON-RPC over stdio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl McpServerConfig {
    pub fn is_http(&self) -> bool {
        self.url.is_some()
    }

    pub fn is_stdio(&self) -> bool {
        self.command.is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MCPError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("transport error on server '{server}': {message}")]
    Transport { server: String, message: String },

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("malformed response from server '{server}': {message}")]
    Protocol { server: String, message: String },
}
