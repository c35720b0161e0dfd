// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pending approvals: the gate a destructive tool call waits behind.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::conversation::ConversationId;

/// A destructive tool call (or a downstream A2A proxy request) awaiting a
/// human or upstream-agent decision. At most one per conversation — enforced
/// by [`crate::domain::conversation::Conversation::status_matches_approval`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingApproval {
    pub uuid: Uuid,
    pub conversation_id: ConversationId,
    pub tool_name: String,
    pub tool_args: serde_json::Value,
    pub description: String,
    /// Set when this approval merely relays a downstream agent's own
    /// `input-required` response rather than gating a local tool call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_agent_name: Option<String>,
}

impl PendingApproval {
    pub fn new(
        conversation_id: ConversationId,
        tool_name: String,
        tool_args: serde_json::Value,
        description: String,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            conversation_id,
            tool_name,
            tool_args,
            description,
            remote_task_id: None,
            remote_agent_name: None,
        }
    }

    pub fn proxy(
        conversation_id: ConversationId,
        description: String,
        remote_task_id: String,
        remote_agent_name: String,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            conversation_id,
            tool_name: format!("a2a_{remote_agent_name}"),
            tool_args: serde_json::Value::Null,
            description,
            remote_task_id: Some(remote_task_id),
            remote_agent_name: Some(remote_agent_name),
        }
    }

    pub fn is_proxy(&self) -> bool {
        self.remote_task_id.is_some()
    }
}

/// A decision on a pending approval, accepted in any of three wire shapes
/// (§4.6): `{approved: bool}`, `{action: "approve"|"reject"}`, `{answer: <keyword>}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApprovalDecisionRequest {
    Approved { approved: bool },
    Action { action: String },
    Answer { answer: String },
}

impl ApprovalDecisionRequest {
    /// Resolve to a boolean approve/reject decision.
    pub fn resolve(&self) -> bool {
        match self {
            Self::Approved { approved } => *approved,
            Self::Action { action } => action.eq_ignore_ascii_case("approve"),
            Self::Answer { answer } => crate::domain::a2a::is_approval_keyword(answer),
        }
    }
}
