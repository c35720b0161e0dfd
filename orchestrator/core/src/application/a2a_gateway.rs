// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! A2A Gateway Application Service (§4.5): routes outbound `message/send`
//! and `tasks/get` calls to the declared peer by name, and forwards approval
//! decisions as follow-up `message/send` calls carrying the stored task id.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::a2a::{A2aClient, A2aError, A2aPeerConfig, Task};
use crate::domain::context::Context;
use crate::domain::OrchestratorError;

struct Peer {
    config: A2aPeerConfig,
    client: Arc<dyn A2aClient>,
}

/// One gateway per orchestrator instance, built once at startup from the
/// configured `a2a` list (§6 Configuration) and injected immutably (§9).
pub struct A2aGateway {
    peers: HashMap<String, Peer>,
}

impl A2aGateway {
    pub fn new(peers: Vec<(A2aPeerConfig, Arc<dyn A2aClient>)>) -> Self {
        let peers = peers
            .into_iter()
            .map(|(config, client)| (config.name.clone(), Peer { config, client }))
            .collect();
        Self { peers }
    }

    pub fn peer_config(&self, name: &str) -> Option<&A2aPeerConfig> {
        self.peers.get(name).map(|p| &p.config)
    }

    /// `message/send` (§4.5). `task_id` absent starts a new task.
    #[instrument(skip(self, ctx), fields(peer = %peer_name))]
    pub async fn send_message(
        &self,
        peer_name: &str,
        task_id: Option<&str>,
        message: &str,
        ctx: &Context,
    ) -> Result<Task, OrchestratorError> {
        let peer = self.peer(peer_name)?;
        info!(task_id = ?task_id, "delegating to A2A peer");
        tokio::select! {
            _ = ctx.cancellation.cancelled() => Err(OrchestratorError::Cancelled),
            result = peer.client.send_message(task_id, message, ctx) => Ok(result?),
        }
    }

    /// Forward a resolved approval decision downstream as a follow-up
    /// `message/send` carrying the stored task id (§4.3 proxy approval
    /// resume). The downstream interprets the keyword per `is_approval_keyword`.
    pub async fn forward_decision(
        &self,
        peer_name: &str,
        task_id: &str,
        approved: bool,
        ctx: &Context,
    ) -> Result<Task, OrchestratorError> {
        let word = if approved { "approved" } else { "rejected" };
        self.send_message(peer_name, Some(task_id), word, ctx).await
    }

    fn peer(&self, name: &str) -> Result<&Peer, OrchestratorError> {
        self.peers
            .get(name)
            .ok_or_else(|| OrchestratorError::from(A2aError::UnknownPeer(name.to_string())))
    }
}
