// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Repository Pattern - Conversation Store
//
// One repository for the one aggregate root the orchestrator persists:
// the Conversation. Follows the DDD Repository Pattern the rest of the
// layer uses — the trait is the domain-level contract; the JSON-file
// implementation lives in `infrastructure::storage`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::conversation::{Conversation, ConversationId};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("conversation not found: {0}")]
    NotFound(ConversationId),

    #[error("no conversation holds pending approval {0}")]
    ApprovalNotFound(Uuid),

    #[error("storage I/O error: {0}")]
    Io(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Persistence contract for conversations (§6 Persistence layout).
///
/// Implementations must serialize concurrent appends to the same
/// conversation and must support a `save`/`get` round trip that yields a
/// structurally identical record (§8).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, id: ConversationId) -> Result<Conversation, RepositoryError>;

    async fn list(&self) -> Result<Vec<Conversation>, RepositoryError>;

    async fn save(&self, conversation: &Conversation) -> Result<(), RepositoryError>;

    /// Find the conversation currently holding a pending approval with this
    /// uuid. May scan (§6); accelerated by an in-process index in the
    /// concrete implementation.
    async fn find_by_approval_uuid(&self, uuid: Uuid) -> Result<Conversation, RepositoryError>;

    /// Atomically claim the pending approval identified by `uuid`: locate
    /// its conversation and make the uuid unresolvable to any other caller
    /// before returning (§5 "remove-before-act"; §8 "never reused after
    /// resolution"). Two concurrent claims of the same uuid must yield
    /// exactly one `Ok` and one `ApprovalNotFound` — the returned
    /// conversation still carries the claimed `pending_approval`/
    /// `pipeline_state` so the caller can execute the deferred resume.
    async fn claim_approval(&self, uuid: Uuid) -> Result<Conversation, RepositoryError>;
}
