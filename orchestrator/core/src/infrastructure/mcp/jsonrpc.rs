// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared JSON-RPC 2.0 envelope and MCP wire shapes for the HTTP and stdio
//! transports (§6): `initialize`, `tools/list`, `tools/call`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::tool::{ToolDescriptor, ToolInputSchema};

#[derive(Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: &'static str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// `initialize` params: minimal client info, no capability negotiation
/// beyond what the core relies on.
pub fn initialize_params() -> Value {
    serde_json::json!({
        "protocolVersion": "2024-11-05",
        "clientInfo": { "name": "loom-orchestrator", "version": env!("CARGO_PKG_VERSION") },
        "capabilities": {},
    })
}

/// One entry in a `tools/list` response.
#[derive(Deserialize)]
pub struct RpcToolEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "ToolInputSchema::empty_object")]
    pub input_schema: ToolInputSchema,
    #[serde(rename = "destructiveHint", default)]
    pub destructive_hint: bool,
}

#[derive(Deserialize)]
pub struct RpcToolsListResult {
    #[serde(default)]
    pub tools: Vec<RpcToolEntry>,
}

pub fn tool_descriptors(result: RpcToolsListResult) -> Vec<ToolDescriptor> {
    result
        .tools
        .into_iter()
        .map(|t| ToolDescriptor {
            name: t.name,
            description: t.description,
            input_schema: t.input_schema,
            destructive: t.destructive_hint,
            server: String::new(),
        })
        .collect()
}

pub fn tools_call_params(tool_name: &str, args: Value) -> Value {
    serde_json::json!({ "name": tool_name, "arguments": args })
}

/// Authentication-failure JSON-RPC error codes an MCP server may return,
/// converted to `MCPError::AuthRequired` unchanged (§4.2).
pub fn is_auth_error_code(code: i64) -> bool {
    matches!(code, -32001 | 401 | 403)
}
