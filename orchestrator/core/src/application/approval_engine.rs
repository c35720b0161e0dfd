// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Approval Engine Application Service (§4.6): the thin seam between the
//! REST façade and the tree interpreter for the approve/reject half of the
//! pause/resume cycle. Creation of a `PendingApproval` happens inline where
//! the destructive call is discovered (`application::turn_loop`); this
//! service owns only resolution — parsing whichever of the three accepted
//! wire shapes the caller sent, then handing a plain `bool` to
//! `Orchestrator::resume_by_uuid`, which already distinguishes a local
//! resume from a proxied A2A forward by inspecting the stored
//! `PendingApproval` itself.
//!
//! Does not pre-check the uuid against the store: `resume_by_uuid` claims
//! it atomically via `ConversationStore::claim_approval` (§5
//! "remove-before-act"), so a separate lookup here would reopen the exact
//! race it closes — two concurrent `decide` calls could both pass a
//! read-only pre-check and both reach the resume.

use std::sync::Arc;

use uuid::Uuid;

use crate::application::orchestrator::{Orchestrator, RunOutcome};
use crate::domain::approval::ApprovalDecisionRequest;
use crate::domain::context::Context;
use crate::domain::OrchestratorError;

pub struct ApprovalEngine {
    orchestrator: Arc<Orchestrator>,
}

impl ApprovalEngine {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Resolve `decision` against the pending approval identified by
    /// `uuid` and resume the run (§6 `POST /approvals/:uuid`). An unknown
    /// uuid surfaces as `OrchestratorError::ApprovalNotFound` straight from
    /// the claim in `resume_by_uuid`, which the façade maps to a 404.
    pub async fn decide(
        &self,
        uuid: Uuid,
        decision: ApprovalDecisionRequest,
        ctx: Context,
    ) -> Result<RunOutcome, OrchestratorError> {
        let approved = decision.resolve();
        self.orchestrator.resume_by_uuid(uuid, approved, ctx).await
    }
}
