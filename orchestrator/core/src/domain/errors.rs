// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Error taxonomy for the orchestration core.
//!
//! One enum covers every boundary the Orchestrator itself distinguishes.
//! Infrastructure adapters (HTTP clients, file I/O) work in `anyhow::Result`
//! internally and convert at the call site, mirroring how
//! `infrastructure::llm::anthropic` narrows `reqwest::Error` into `LLMError`.

use uuid::Uuid;

/// Errors the orchestrator core distinguishes and acts on directly.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("duplicate tool '{tool_name}' registered by both '{first_server}' and '{second_server}'")]
    DuplicateTool {
        tool_name: String,
        first_server: String,
        second_server: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("authentication required")]
    AuthRequired,

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("no pending approval for uuid {0}")]
    ApprovalNotFound(Uuid),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrchestratorError {
    /// Whether this error should abort the whole run (vs. becoming a
    /// tool-result error message the LLM can see and retry past).
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, Self::AuthRequired | Self::Cancelled)
    }
}

impl From<crate::domain::mcp::MCPError> for OrchestratorError {
    fn from(err: crate::domain::mcp::MCPError) -> Self {
        use crate::domain::mcp::MCPError;
        match err {
            MCPError::ToolNotFound(name) => Self::ToolNotFound(name),
            MCPError::AuthRequired => Self::AuthRequired,
            MCPError::Transport { server, message } => {
                Self::Transport(format!("{server}: {message}"))
            }
            MCPError::Timeout(secs) => Self::Transport(format!("timed out after {secs}s")),
            MCPError::Protocol { server, message } => {
                Self::Transport(format!("{server}: malformed response: {message}"))
            }
        }
    }
}

impl From<crate::domain::llm::LLMError> for OrchestratorError {
    fn from(err: crate::domain::llm::LLMError) -> Self {
        use crate::domain::llm::LLMError;
        match err {
            LLMError::Authentication(_) => Self::AuthRequired,
            LLMError::Network(msg) => Self::Transport(msg),
            LLMError::RateLimit => Self::Provider {
                status: 429,
                message: "rate limit exceeded".to_string(),
            },
            LLMError::ModelNotFound(model) => Self::Config(format!("model not found: {model}")),
            LLMError::Provider { status, message } => Self::Provider { status, message },
            LLMError::Protocol(msg) => Self::Transport(format!("malformed provider response: {msg}")),
            LLMError::Timeout(secs) => Self::Transport(format!("generation timed out after {secs}s")),
        }
    }
}

impl From<crate::domain::a2a::A2aError> for OrchestratorError {
    fn from(err: crate::domain::a2a::A2aError) -> Self {
        use crate::domain::a2a::A2aError;
        match err {
            A2aError::UnknownPeer(name) => Self::Config(format!("unknown A2A peer: {name}")),
            A2aError::Transport(msg) => Self::Transport(msg),
            A2aError::UnexpectedInputRequired { peer, state } => {
                Self::Other(anyhow::anyhow!(
                    "peer '{peer}' returned unexpected state {state:?} for a non-destructive delegation"
                ))
            }
            A2aError::Protocol(msg) => Self::Transport(format!("malformed A2A response: {msg}")),
        }
    }
}

impl From<crate::domain::repository::RepositoryError> for OrchestratorError {
    fn from(err: crate::domain::repository::RepositoryError) -> Self {
        use crate::domain::repository::RepositoryError;
        match err {
            RepositoryError::NotFound(id) => Self::Other(anyhow::anyhow!("conversation not found: {id}")),
            RepositoryError::ApprovalNotFound(uuid) => Self::ApprovalNotFound(uuid),
            RepositoryError::Io(msg) => Self::Other(anyhow::anyhow!("storage I/O error: {msg}")),
            RepositoryError::Corrupt(msg) => Self::Other(anyhow::anyhow!("corrupt record: {msg}")),
        }
    }
}
