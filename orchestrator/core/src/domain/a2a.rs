// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! A2A (Agent-to-Agent) domain types: peer configuration, task state
//! vocabulary, and the approval-keyword semantics used to interpret a
//! follow-up `message/send` as an approve/reject decision (§4.5).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::context::Context;

/// One configured remote peer an `llm` node may delegate to as a synthetic
/// `a2a_<name>` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2aPeerConfig {
    pub name: String,
    pub url: String,
    pub description: String,
    #[serde(default, rename = "destructiveHint")]
    pub destructive_hint: bool,
}

/// Task state vocabulary mirrored from conversation status (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Completed,
    InputRequired,
}

/// A downstream A2A task as observed by the delegating agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

/// The fixed, case-insensitive set of keywords a follow-up `message/send`
/// is interpreted against when resolving a downstream approval (§4.5, §9
/// Open Questions — resolved as this static set).
const APPROVAL_KEYWORDS: &[&str] = &["yes", "y", "true", "approve", "approved", "ok", "confirm"];

pub fn is_approval_keyword(answer: &str) -> bool {
    let lower = answer.trim().to_lowercase();
    APPROVAL_KEYWORDS.contains(&lower.as_str())
}

/// Outbound A2A JSON-RPC operations (§4.5): implemented over HTTP in
/// `infrastructure::a2a::HttpA2aClient`, injected into
/// `application::a2a_gateway::A2aGateway` per declared peer.
#[async_trait]
pub trait A2aClient: Send + Sync {
    /// `message/send`. `task_id` absent starts a new task; present, it is
    /// interpreted downstream as an approval response.
    async fn send_message(
        &self,
        task_id: Option<&str>,
        message: &str,
        ctx: &Context,
    ) -> Result<Task, A2aError>;

    /// `tasks/get`.
    async fn get_task(&self, task_id: &str, ctx: &Context) -> Result<Task, A2aError>;
}

#[derive(Debug, thiserror::Error)]
pub enum A2aError {
    #[error("unknown peer: {0}")]
    UnknownPeer(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected downstream state for non-destructive peer '{peer}': {state:?}")]
    UnexpectedInputRequired { peer: String, state: TaskState },

    #[error("malformed A2A response: {0}")]
    Protocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_all_documented_keywords_case_insensitively() {
        for word in ["YES", "y", "True", "Approve", "APPROVED", "ok", "Confirm"] {
            assert!(is_approval_keyword(word), "expected {word} to approve");
        }
    }

    #[test]
    fn rejects_unrecognized_words() {
        assert!(!is_approval_keyword("nope"));
        assert!(!is_approval_keyword("maybe later"));
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert!(is_approval_keyword("  yes  "));
    }
}
