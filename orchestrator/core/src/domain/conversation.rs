// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! The `Conversation` aggregate: the root persisted record for one run of
//! the agent tree. Owns its message history, and — mutually exclusively
//! with its `Active`/`Completed` status — a pending approval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::approval::PendingApproval;
use crate::domain::pipeline::PipelineState;

pub type ConversationId = Uuid;

/// Lifecycle status of a conversation. `WaitingApproval` and
/// `pending_approval` must always agree — see [`Conversation::status_matches_approval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    WaitingApproval,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Record of a tool invocation attached to an assistant or tool message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: serde_json::Value,
    pub result: Option<String>,
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallRecord>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content, None)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content, None)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content, None)
    }

    pub fn assistant_tool_call(call: ToolCallRecord) -> Self {
        Self::new(MessageRole::Assistant, String::new(), Some(call))
    }

    pub fn tool_result(call: ToolCallRecord) -> Self {
        let content = call
            .result
            .clone()
            .unwrap_or_else(|| "(no result)".to_string());
        Self::new(MessageRole::Tool, content, Some(call))
    }

    fn new(role: MessageRole, content: impl Into<String>, tool_call: Option<ToolCallRecord>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call,
            timestamp: Utc::now(),
        }
    }
}

/// Root aggregate: one conversation's full persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub session_id: String,
    pub status: ConversationStatus,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub pending_approval: Option<PendingApproval>,
    #[serde(default)]
    pub pipeline_state: Option<PipelineState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: ConversationId, session_id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            session_id,
            status: ConversationStatus::Active,
            messages: Vec::new(),
            pending_approval: None,
            pipeline_state: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// §3 invariant: `pending_approval ≠ ∅ ⇔ status = waiting_approval`.
    pub fn status_matches_approval(&self) -> bool {
        (self.pending_approval.is_some()) == (self.status == ConversationStatus::WaitingApproval)
    }

    pub fn begin_waiting_approval(&mut self, approval: PendingApproval, pipeline: PipelineState) {
        self.pending_approval = Some(approval);
        self.pipeline_state = Some(pipeline);
        self.status = ConversationStatus::WaitingApproval;
        self.updated_at = Utc::now();
    }

    pub fn clear_approval(&mut self) {
        self.pending_approval = None;
        self.pipeline_state = None;
        self.status = ConversationStatus::Active;
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self) {
        self.status = ConversationStatus::Completed;
        self.updated_at = Utc::now();
    }
}
