// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! One `<uuid>.json` file per conversation under `data_dir` (§6 Persistence
//! layout). Writes go to a sibling temp file and are renamed into place so a
//! reader never observes a partially written record. The approval-uuid index
//! is an in-process `DashMap` rebuilt from disk at startup — §6 allows this
//! lookup to scan, but a live index avoids re-reading every file on every
//! approval decision.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::conversation::{Conversation, ConversationId};
use crate::domain::repository::{ConversationStore, RepositoryError};

pub struct JsonFileConversationStore {
    data_dir: PathBuf,
    approval_index: DashMap<Uuid, ConversationId>,
}

impl JsonFileConversationStore {
    /// Creates `data_dir` if missing and rebuilds the approval index from
    /// whatever conversation records are already on disk.
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| RepositoryError::Io(e.to_string()))?;

        let store = Self {
            data_dir,
            approval_index: DashMap::new(),
        };
        store.rebuild_index().await?;
        Ok(store)
    }

    fn path_for(&self, id: ConversationId) -> PathBuf {
        self.data_dir.join(format!("{id}.json"))
    }

    fn temp_path_for(&self, id: ConversationId) -> PathBuf {
        self.data_dir.join(format!("{id}.json.tmp"))
    }

    async fn rebuild_index(&self) -> Result<(), RepositoryError> {
        let mut entries = tokio::fs::read_dir(&self.data_dir)
            .await
            .map_err(|e| RepositoryError::Io(e.to_string()))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RepositoryError::Io(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let conversation = match read_conversation(&path).await {
                Ok(c) => c,
                Err(_) => continue,
            };
            if let Some(approval) = &conversation.pending_approval {
                self.approval_index.insert(approval.uuid, conversation.id);
            }
        }
        Ok(())
    }

    fn reindex(&self, conversation: &Conversation) {
        self.approval_index
            .retain(|_, cid| *cid != conversation.id);
        if let Some(approval) = &conversation.pending_approval {
            self.approval_index.insert(approval.uuid, conversation.id);
        }
    }
}

async fn read_conversation(path: &Path) -> Result<Conversation, RepositoryError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| RepositoryError::Io(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| RepositoryError::Corrupt(e.to_string()))
}

#[async_trait]
impl ConversationStore for JsonFileConversationStore {
    #[instrument(skip(self))]
    async fn get(&self, id: ConversationId) -> Result<Conversation, RepositoryError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(RepositoryError::NotFound(id));
        }
        read_conversation(&path).await
    }

    async fn list(&self) -> Result<Vec<Conversation>, RepositoryError> {
        let mut entries = tokio::fs::read_dir(&self.data_dir)
            .await
            .map_err(|e| RepositoryError::Io(e.to_string()))?;
        let mut conversations = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RepositoryError::Io(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            conversations.push(read_conversation(&path).await?);
        }
        conversations.sort_by_key(|c| c.created_at);
        Ok(conversations)
    }

    #[instrument(skip(self, conversation), fields(id = %conversation.id))]
    async fn save(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec_pretty(conversation)
            .map_err(|e| RepositoryError::Corrupt(e.to_string()))?;

        let temp_path = self.temp_path_for(conversation.id);
        tokio::fs::write(&temp_path, &bytes)
            .await
            .map_err(|e| RepositoryError::Io(e.to_string()))?;
        tokio::fs::rename(&temp_path, self.path_for(conversation.id))
            .await
            .map_err(|e| RepositoryError::Io(e.to_string()))?;

        self.reindex(conversation);
        Ok(())
    }

    async fn find_by_approval_uuid(&self, uuid: Uuid) -> Result<Conversation, RepositoryError> {
        let id = *self
            .approval_index
            .get(&uuid)
            .ok_or(RepositoryError::ApprovalNotFound(uuid))?;
        self.get(id).await
    }

    /// `DashMap::remove` is the atomic claim: only one of two concurrent
    /// callers observes `Some` for the same uuid, so the loser gets
    /// `ApprovalNotFound` before either dispatches the deferred call.
    async fn claim_approval(&self, uuid: Uuid) -> Result<Conversation, RepositoryError> {
        let (_, id) = self
            .approval_index
            .remove(&uuid)
            .ok_or(RepositoryError::ApprovalNotFound(uuid))?;
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::approval::PendingApproval;
    use crate::domain::pipeline::PipelineState;

    fn new_conversation() -> Conversation {
        Conversation::new(Uuid::new_v4(), "abcd1234".to_string())
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileConversationStore::open(dir.path()).await.unwrap();
        let conversation = new_conversation();
        store.save(&conversation).await.unwrap();

        let loaded = store.get(conversation.id).await.unwrap();
        assert_eq!(loaded.id, conversation.id);
        assert_eq!(loaded.session_id, conversation.session_id);
    }

    #[tokio::test]
    async fn get_missing_conversation_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileConversationStore::open(dir.path()).await.unwrap();
        let err = store.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn find_by_approval_uuid_locates_the_holding_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileConversationStore::open(dir.path()).await.unwrap();
        let mut conversation = new_conversation();
        let approval = PendingApproval::new(
            conversation.id,
            "resources_add".to_string(),
            serde_json::json!({}),
            "add a resource".to_string(),
        );
        let uuid = approval.uuid;
        conversation.begin_waiting_approval(
            approval,
            PipelineState {
                paused_node_path: vec![0],
                paused_node_output_key: String::new(),
                session_state: Default::default(),
                user_message: "add resource X".to_string(),
            },
        );
        store.save(&conversation).await.unwrap();

        let found = store.find_by_approval_uuid(uuid).await.unwrap();
        assert_eq!(found.id, conversation.id);
    }

    #[tokio::test]
    async fn clearing_an_approval_removes_it_from_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileConversationStore::open(dir.path()).await.unwrap();
        let mut conversation = new_conversation();
        let approval = PendingApproval::new(
            conversation.id,
            "resources_add".to_string(),
            serde_json::json!({}),
            "add a resource".to_string(),
        );
        let uuid = approval.uuid;
        conversation.begin_waiting_approval(
            approval,
            PipelineState {
                paused_node_path: vec![],
                paused_node_output_key: String::new(),
                session_state: Default::default(),
                user_message: String::new(),
            },
        );
        store.save(&conversation).await.unwrap();
        conversation.clear_approval();
        store.save(&conversation).await.unwrap();

        let err = store.find_by_approval_uuid(uuid).await.unwrap_err();
        assert!(matches!(err, RepositoryError::ApprovalNotFound(_)));
    }

    #[tokio::test]
    async fn claim_approval_is_resolvable_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileConversationStore::open(dir.path()).await.unwrap();
        let mut conversation = new_conversation();
        let approval = PendingApproval::new(
            conversation.id,
            "resources_add".to_string(),
            serde_json::json!({}),
            "add a resource".to_string(),
        );
        let uuid = approval.uuid;
        conversation.begin_waiting_approval(
            approval,
            PipelineState {
                paused_node_path: vec![],
                paused_node_output_key: String::new(),
                session_state: Default::default(),
                user_message: String::new(),
            },
        );
        store.save(&conversation).await.unwrap();

        let first = store.claim_approval(uuid).await;
        let second = store.claim_approval(uuid).await;
        assert!(first.is_ok());
        assert!(matches!(second.unwrap_err(), RepositoryError::ApprovalNotFound(_)));
    }

    #[tokio::test]
    async fn reopening_the_store_rebuilds_the_index_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut conversation = new_conversation();
        let approval = PendingApproval::new(
            conversation.id,
            "resources_add".to_string(),
            serde_json::json!({}),
            "add a resource".to_string(),
        );
        let uuid = approval.uuid;
        conversation.begin_waiting_approval(
            approval,
            PipelineState {
                paused_node_path: vec![],
                paused_node_output_key: String::new(),
                session_state: Default::default(),
                user_message: String::new(),
            },
        );
        {
            let store = JsonFileConversationStore::open(dir.path()).await.unwrap();
            store.save(&conversation).await.unwrap();
        }

        let reopened = JsonFileConversationStore::open(dir.path()).await.unwrap();
        let found = reopened.find_by_approval_uuid(uuid).await.unwrap();
        assert_eq!(found.id, conversation.id);
    }

    #[tokio::test]
    async fn list_returns_all_saved_conversations() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileConversationStore::open(dir.path()).await.unwrap();
        store.save(&new_conversation()).await.unwrap();
        store.save(&new_conversation()).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
