// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! MCP sub-client transports (§4.2, §6): Streamable HTTP and subprocess
//! stdio, both speaking JSON-RPC 2.0 and both implementing the domain's
//! `McpSubClient` trait so `application::mcp_composite::McpComposite` can
//! treat them identically.

mod jsonrpc;

pub mod http;
pub mod stdio;

pub use http::HttpMcpClient;
pub use stdio::StdioMcpClient;
