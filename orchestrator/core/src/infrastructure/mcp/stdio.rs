// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Subprocess stdio MCP sub-client (§4.2, §6): a child process speaking
//! line-delimited JSON-RPC 2.0 over stdin/stdout. Does not forward the
//! request `Context` (no header concept over a pipe) — only HTTP sub-clients
//! propagate bearer/session headers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::domain::context::Context;
use crate::domain::mcp::{MCPError, McpSubClient, MCP_CALL_TIMEOUT_SECS};
use crate::domain::tool::ToolDescriptor;

use super::jsonrpc::{
    initialize_params, is_auth_error_code, tool_descriptors, tools_call_params, RpcRequest,
    RpcResponse, RpcToolsListResult,
};

struct ChildPipes {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Spawns and owns a single child process for the lifetime of the
/// composite. Calls are serialized through `pipes` — one request in flight
/// at a time on the pipe pair — since stdio gives us no way to multiplex
/// concurrent JSON-RPC calls over a single stdin/stdout stream.
pub struct StdioMcpClient {
    name: String,
    pipes: Mutex<ChildPipes>,
    next_id: AtomicU64,
}

impl StdioMcpClient {
    pub async fn spawn(name: String, command: &str, args: &[String]) -> Result<Self, MCPError> {
        let mut child = tokio::process::Command::new(command)
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| MCPError::Transport {
                server: name.clone(),
                message: format!("failed to spawn '{command}': {e}"),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| MCPError::Transport {
            server: name.clone(),
            message: "child process has no stdin".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| MCPError::Transport {
            server: name.clone(),
            message: "child process has no stdout".to_string(),
        })?;

        Ok(Self {
            name,
            pipes: Mutex::new(ChildPipes {
                child,
                stdin,
                stdout: BufReader::new(stdout),
            }),
            next_id: AtomicU64::new(1),
        })
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn rpc(&self, method: &'static str, params: Value) -> Result<Value, MCPError> {
        let request = RpcRequest::new(self.next_request_id(), method, params);
        let mut line = serde_json::to_string(&request).map_err(|e| MCPError::Protocol {
            server: self.name.clone(),
            message: e.to_string(),
        })?;
        line.push('\n');

        let mut pipes = self.pipes.lock().await;
        let roundtrip = async {
            pipes
                .stdin
                .write_all(line.as_bytes())
                .await
                .map_err(|e| MCPError::Transport {
                    server: self.name.clone(),
                    message: format!("write failed: {e}"),
                })?;
            pipes.stdin.flush().await.map_err(|e| MCPError::Transport {
                server: self.name.clone(),
                message: format!("flush failed: {e}"),
            })?;

            let mut response_line = String::new();
            let bytes_read =
                pipes
                    .stdout
                    .read_line(&mut response_line)
                    .await
                    .map_err(|e| MCPError::Transport {
                        server: self.name.clone(),
                        message: format!("read failed: {e}"),
                    })?;
            if bytes_read == 0 {
                return Err(MCPError::Transport {
                    server: self.name.clone(),
                    message: "child process closed stdout".to_string(),
                });
            }
            Ok(response_line)
        };

        let response_line = tokio::time::timeout(Duration::from_secs(MCP_CALL_TIMEOUT_SECS), roundtrip)
            .await
            .map_err(|_| MCPError::Timeout(MCP_CALL_TIMEOUT_SECS))??;

        let response: RpcResponse =
            serde_json::from_str(response_line.trim()).map_err(|e| MCPError::Protocol {
                server: self.name.clone(),
                message: e.to_string(),
            })?;

        if let Some(err) = response.error {
            if is_auth_error_code(err.code) {
                return Err(MCPError::AuthRequired);
            }
            return Err(MCPError::Transport {
                server: self.name.clone(),
                message: err.message,
            });
        }

        response.result.ok_or_else(|| MCPError::Protocol {
            server: self.name.clone(),
            message: "response carried neither result nor error".to_string(),
        })
    }
}

#[async_trait]
impl McpSubClient for StdioMcpClient {
    fn server_name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(server = %self.name))]
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, MCPError> {
        self.rpc("initialize", initialize_params()).await?;
        let result = self.rpc("tools/list", Value::Object(Default::default())).await?;
        let parsed: RpcToolsListResult = serde_json::from_value(result).map_err(|e| MCPError::Protocol {
            server: self.name.clone(),
            message: e.to_string(),
        })?;
        Ok(tool_descriptors(parsed))
    }

    async fn call(&self, tool_name: &str, args: Value, _ctx: &Context) -> Result<Value, MCPError> {
        self.rpc("tools/call", tools_call_params(tool_name, args)).await
    }

    async fn stop(&self) -> Result<(), MCPError> {
        let mut pipes = self.pipes.lock().await;
        pipes.child.kill().await.map_err(|e| MCPError::Transport {
            server: self.name.clone(),
            message: format!("failed to kill child process: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `cat` echoes each request line straight back on stdout. It is not a
    /// real MCP server, but it exercises the write/flush/read-line plumbing
    /// without requiring a fixture binary: the echoed line decodes as an
    /// `RpcResponse` with neither `result` nor `error`, which is itself a
    /// `Protocol` error — the assertion below.
    #[tokio::test]
    async fn round_trips_a_line_over_the_child_process_pipe() {
        let client = StdioMcpClient::spawn("echo".to_string(), "cat", &[])
            .await
            .expect("cat must be on PATH in the test environment");
        let err = client
            .rpc("tools/list", Value::Object(Default::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, MCPError::Protocol { .. }));
        client.stop().await.unwrap();
    }

    #[tokio::test]
    async fn spawn_failure_surfaces_as_transport_error() {
        let err = StdioMcpClient::spawn(
            "missing".to_string(),
            "definitely-not-a-real-binary-xyz",
            &[],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MCPError::Transport { .. }));
    }
}
