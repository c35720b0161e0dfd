// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # LLM Gateway Domain Interface (Anti-Corruption Layer)
//!
//! Defines the domain contract for LLM providers. Prevents vendor lock-in by
//! abstracting provider-specific request/response shapes behind a single
//! `generate-with-tools` call. Implementations live in `infrastructure::llm`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::conversation::Message;
use crate::domain::tool::{ToolCall, ToolDescriptor};

/// Domain interface every LLM provider adapter implements.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate the next turn given a system prompt, message history, and
    /// the tool surface available at this node. Returns exactly one of
    /// `text` or `tool_call` (tool_call takes precedence if a provider
    /// response is ambiguous).
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<GenerationResult, LLMError>;

    /// Check if the provider is reachable and authenticated.
    async fn health_check(&self) -> Result<(), LLMError>;
}

/// The gateway's per-call deadline (§4.1).
pub const GENERATION_DEADLINE_SECS: u64 = 60;

/// Result of one `generate` call: either a final text response or a single
/// tool call to execute before the next turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GenerationResult {
    Text(String),
    ToolCall(ToolCall),
}

/// Errors that can occur during LLM generation.
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication required: {0}")]
    Authentication(String),

    #[error("rate limit exceeded")]
    RateLimit,

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("malformed provider response: {0}")]
    Protocol(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),
}

/// Coerce tool-call arguments against the tool's declared schema: any
/// argument whose schema type is `string` but whose decoded JSON value is
/// numeric or boolean is rendered to its canonical string form. Non-string
/// schema types, and arguments with no schema entry, are left untouched.
///
/// This is a domain-level normalization of provider output, not a tool
/// semantic — kept here rather than in the MCP composite or tool caller.
pub fn coerce_tool_call_arguments(tool: &ToolDescriptor, call: &mut ToolCall) {
    let serde_json::Value::Object(map) = &mut call.arguments else {
        return;
    };

    for (key, value) in map.iter_mut() {
        if tool.input_schema.property_type(key) != Some("string") {
            continue;
        }
        let canonical = match value {
            serde_json::Value::Number(n) => Some(canonical_number_string(n)),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        };
        if let Some(s) = canonical {
            *value = serde_json::Value::String(s);
        }
    }
}

fn canonical_number_string(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else if let Some(f) = n.as_f64() {
        let mut buf = ryu::Buffer::new();
        buf.format(f).to_string()
    } else {
        n.to_string()
    }
}
