// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Streamable HTTP MCP sub-client (§4.2, §6): JSON-RPC 2.0 over `reqwest`,
//! forwarding the request `Context`'s bearer token and session id as
//! `Authorization`/`X-Session-ID` headers on every call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use crate::domain::context::Context;
use crate::domain::mcp::{MCPError, McpSubClient, MCP_CALL_TIMEOUT_SECS};
use crate::domain::tool::ToolDescriptor;

use super::jsonrpc::{
    initialize_params, is_auth_error_code, tool_descriptors, tools_call_params, RpcRequest,
    RpcResponse, RpcToolsListResult,
};

pub struct HttpMcpClient {
    name: String,
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpMcpClient {
    pub fn new(name: String, url: String) -> Self {
        Self {
            name,
            url,
            client: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn rpc(&self, method: &'static str, params: Value, ctx: &Context) -> Result<Value, MCPError> {
        let request = RpcRequest::new(self.next_request_id(), method, params);
        let mut req = self
            .client
            .post(&self.url)
            .timeout(Duration::from_secs(MCP_CALL_TIMEOUT_SECS))
            .json(&request);

        if let Some(token) = &ctx.bearer_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        req = req.header("X-Session-ID", &ctx.session_id);

        let response = req.send().await.map_err(|e| MCPError::Transport {
            server: self.name.clone(),
            message: e.to_string(),
        })?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(MCPError::AuthRequired);
        }
        if !response.status().is_success() {
            return Err(MCPError::Transport {
                server: self.name.clone(),
                message: format!("HTTP {}", response.status()),
            });
        }

        let body: RpcResponse = response.json().await.map_err(|e| MCPError::Protocol {
            server: self.name.clone(),
            message: e.to_string(),
        })?;

        if let Some(err) = body.error {
            if is_auth_error_code(err.code) {
                return Err(MCPError::AuthRequired);
            }
            return Err(MCPError::Transport {
                server: self.name.clone(),
                message: err.message,
            });
        }

        body.result.ok_or_else(|| MCPError::Protocol {
            server: self.name.clone(),
            message: "response carried neither result nor error".to_string(),
        })
    }
}

#[async_trait]
impl McpSubClient for HttpMcpClient {
    fn server_name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(server = %self.name))]
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, MCPError> {
        let ctx = Context::new(None);
        self.rpc("initialize", initialize_params(), &ctx).await?;
        let result = self.rpc("tools/list", Value::Object(Default::default()), &ctx).await?;
        let parsed: RpcToolsListResult = serde_json::from_value(result).map_err(|e| MCPError::Protocol {
            server: self.name.clone(),
            message: e.to_string(),
        })?;
        Ok(tool_descriptors(parsed))
    }

    async fn call(&self, tool_name: &str, args: Value, ctx: &Context) -> Result<Value, MCPError> {
        self.rpc("tools/call", tools_call_params(tool_name, args), ctx).await
    }

    async fn stop(&self) -> Result<(), MCPError> {
        Ok(())
    }
}
