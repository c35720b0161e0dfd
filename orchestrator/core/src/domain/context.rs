// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Request context: bearer token and session id.
//!
//! Carried by value through every outbound MCP/A2A call. Never persisted —
//! a resumed run is re-issued a fresh `Context` by the façade rather than
//! recovering the original one from storage.

use rand::Rng;
use tokio_util::sync::CancellationToken;

/// Per-request context propagated to every outbound call.
#[derive(Debug, Clone)]
pub struct Context {
    /// Bearer token forwarded as `Authorization: Bearer <token>`.
    pub bearer_token: Option<String>,
    /// 8-character hex tracing tag forwarded as `X-Session-ID`.
    pub session_id: String,
    /// Cancellation signal for in-flight LLM/MCP/A2A calls.
    pub cancellation: CancellationToken,
}

impl Context {
    pub fn new(bearer_token: Option<String>) -> Self {
        Self {
            bearer_token,
            session_id: generate_session_id(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_session_id(bearer_token: Option<String>, session_id: String) -> Self {
        Self {
            bearer_token,
            session_id,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Generate an 8-char hex session tracing tag.
fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 4] = rng.gen();
    hex::encode(bytes)
}
