// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Orchestrator Application Service (§4.3): the tree interpreter.
//!
//! Walks the closed `Node` variant set top-down, threading one shared
//! `Conversation` and `SessionState` through every node, and resolving the
//! pause policy for destructive tool calls from the nearest composite
//! ancestor on the way down rather than a property of the leaf itself.
//! Resume re-walks the same tree along the `paused_node_path` recorded at
//! pause time instead of restoring a captured continuation — the same
//! "plain value over captured stack" trade the domain's `PipelineState`
//! type is built around.

use std::sync::Arc;

use futures::future::{join_all, BoxFuture, FutureExt};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::application::a2a_gateway::A2aGateway;
use crate::application::mcp_composite::McpComposite;
use crate::application::turn_loop::{LeafOutcome, PausePolicy, PendingKind, TurnLoop};
use crate::domain::a2a::{A2aError, TaskState};
use crate::domain::approval::PendingApproval;
use crate::domain::config::AppConfig;
use crate::domain::context::Context;
use crate::domain::conversation::{Conversation, ConversationId, Message};
use crate::domain::node::{A2aNode, LlmNode, Node};
use crate::domain::pipeline::PipelineState;
use crate::domain::repository::ConversationStore;
use crate::domain::session_state::SessionState;
use crate::domain::OrchestratorError;
use crate::infrastructure::llm::registry::ProviderRegistry;

/// What a run produced: either a final answer, or the uuid of the
/// approval it is now waiting on (§4.3, §6 `POST /conversations/:id/messages`).
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(String),
    AwaitingApproval(Uuid),
}

/// One node's result once it (and everything beneath it) has finished
/// running for this turn of the interpreter.
enum NodeResult {
    Completed(Option<String>),
    ExitLoop,
    Paused {
        approval: PendingApproval,
        /// Child indices from this node down to the paused leaf.
        path: Vec<usize>,
        output_key: String,
    },
}

/// Same shape as [`NodeResult`] but scoped to one loop-body iteration, kept
/// distinct so loop bookkeeping (iteration index) stays local to the loop
/// executor instead of leaking into the general node result.
enum LoopChildOutcome {
    Completed(Option<String>),
    ExitLoop,
    Paused {
        approval: PendingApproval,
        path: Vec<usize>,
        output_key: String,
    },
}

/// Built once at startup from configuration and shared across every
/// request the façade handles (§9 "Global-ish state avoided").
pub struct Orchestrator {
    store: Arc<dyn ConversationStore>,
    turn_loop: TurnLoop,
    a2a: Arc<A2aGateway>,
    tree: Node,
}

impl Orchestrator {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn ConversationStore>,
        providers: Arc<ProviderRegistry>,
        mcp: Arc<McpComposite>,
        a2a: Arc<A2aGateway>,
    ) -> Self {
        let tree = effective_tree(config);
        let turn_loop = TurnLoop::new(providers, mcp, a2a.clone());
        Self {
            store,
            turn_loop,
            a2a,
            tree,
        }
    }

    pub fn tree(&self) -> &Node {
        &self.tree
    }

    /// Start a fresh run: append the user's message, then walk the tree
    /// from the root (§4.3, §8 Scenario 1/2).
    pub async fn start(
        &self,
        conversation_id: ConversationId,
        session_id: String,
        user_message: String,
        ctx: Context,
    ) -> Result<RunOutcome, OrchestratorError> {
        let mut conversation = Conversation::new(conversation_id, session_id);
        conversation.push_message(Message::user(user_message.clone()));
        let conv = Arc::new(tokio::sync::Mutex::new(conversation));
        let session_state = Arc::new(RwLock::new(SessionState::new()));

        let result = self
            .execute_node(&self.tree, PausePolicy::Pause, conv.clone(), session_state.clone(), ctx)
            .await?;
        self.finalize(result, conv, session_state, user_message).await
    }

    /// Resolve the pending approval identified by `approval_uuid` and
    /// resume the run from where it paused (§4.3, §8 Scenario 3/4).
    pub async fn resume_by_uuid(
        &self,
        approval_uuid: Uuid,
        approved: bool,
        ctx: Context,
    ) -> Result<RunOutcome, OrchestratorError> {
        // Claim first, act second (§5, §8): the store makes `approval_uuid`
        // unresolvable to any other caller before we dispatch the deferred
        // call, so two concurrent resolutions of the same uuid can never
        // both execute it.
        let conversation = self.store.claim_approval(approval_uuid).await?;
        let pending = conversation
            .pending_approval
            .clone()
            .ok_or(OrchestratorError::ApprovalNotFound(approval_uuid))?;
        let pipeline = conversation
            .pipeline_state
            .clone()
            .ok_or(OrchestratorError::ApprovalNotFound(approval_uuid))?;
        let user_message = pipeline.user_message.clone();
        let session_state = Arc::new(RwLock::new(pipeline.session_state.clone()));
        let conv = Arc::new(tokio::sync::Mutex::new(conversation));

        let result = self
            .resume_node(
                &self.tree,
                &pipeline.paused_node_path,
                PausePolicy::Pause,
                &pending,
                approved,
                conv.clone(),
                session_state.clone(),
                ctx,
            )
            .await?;

        conv.lock().await.clear_approval();
        self.finalize(result, conv, session_state, user_message).await
    }

    async fn finalize(
        &self,
        result: NodeResult,
        conv: Arc<tokio::sync::Mutex<Conversation>>,
        session_state: Arc<RwLock<SessionState>>,
        user_message: String,
    ) -> Result<RunOutcome, OrchestratorError> {
        match result {
            NodeResult::Completed(out) => {
                let mut c = conv.lock().await;
                c.complete();
                self.store.save(&c).await?;
                Ok(RunOutcome::Completed(out.unwrap_or_default()))
            }
            NodeResult::ExitLoop => {
                let mut c = conv.lock().await;
                c.complete();
                self.store.save(&c).await?;
                Ok(RunOutcome::Completed(String::new()))
            }
            NodeResult::Paused {
                approval,
                path,
                output_key,
            } => {
                let mut c = conv.lock().await;
                let uuid = approval.uuid;
                let pipeline = PipelineState {
                    paused_node_path: path,
                    paused_node_output_key: output_key,
                    session_state: session_state.read().clone(),
                    user_message,
                };
                c.begin_waiting_approval(approval, pipeline);
                self.store.save(&c).await?;
                Ok(RunOutcome::AwaitingApproval(uuid))
            }
        }
    }

    fn execute_node<'a>(
        &'a self,
        node: &'a Node,
        pause_policy: PausePolicy,
        conv: Arc<tokio::sync::Mutex<Conversation>>,
        session_state: Arc<RwLock<SessionState>>,
        ctx: Context,
    ) -> BoxFuture<'a, Result<NodeResult, OrchestratorError>> {
        async move {
            match node {
                Node::Sequential(seq) => {
                    self.sequential_tail(&seq.children, 0, None, seq.output_key.as_deref(), conv, session_state, ctx)
                        .await
                }
                Node::Parallel(par) => {
                    self.execute_parallel(&par.children, par.output_key.as_deref(), conv, session_state, ctx)
                        .await
                }
                Node::Loop(lp) => {
                    self.execute_loop(&lp.children, lp.max_iterations, lp.output_key.as_deref(), conv, session_state, ctx)
                        .await
                }
                Node::Llm(llm) => self.execute_llm(llm, pause_policy, conv, session_state, ctx).await,
                Node::A2a(a2a) => self.execute_a2a(a2a, conv, session_state, ctx).await,
            }
        }
        .boxed()
    }

    fn resume_node<'a>(
        &'a self,
        node: &'a Node,
        path: &'a [usize],
        pause_policy: PausePolicy,
        pending: &'a PendingApproval,
        approved: bool,
        conv: Arc<tokio::sync::Mutex<Conversation>>,
        session_state: Arc<RwLock<SessionState>>,
        ctx: Context,
    ) -> BoxFuture<'a, Result<NodeResult, OrchestratorError>> {
        async move {
            match node {
                Node::Sequential(seq) => {
                    self.resume_sequential(&seq.children, seq.output_key.as_deref(), path, pending, approved, conv, session_state, ctx)
                        .await
                }
                Node::Parallel(par) => {
                    self.resume_parallel(&par.children, par.output_key.as_deref(), path, pending, approved, conv, session_state, ctx)
                        .await
                }
                Node::Loop(lp) => {
                    self.resume_loop(
                        &lp.children,
                        lp.max_iterations,
                        lp.output_key.as_deref(),
                        path,
                        pending,
                        approved,
                        conv,
                        session_state,
                        ctx,
                    )
                    .await
                }
                Node::Llm(llm) => self.resume_llm(llm, pause_policy, pending, approved, conv, session_state, ctx).await,
                Node::A2a(a2a) => self.resume_a2a(a2a, pending, approved, conv, session_state, ctx).await,
            }
        }
        .boxed()
    }

    // -- Llm leaf ---------------------------------------------------------

    async fn execute_llm(
        &self,
        llm: &LlmNode,
        pause_policy: PausePolicy,
        conv: Arc<tokio::sync::Mutex<Conversation>>,
        session_state: Arc<RwLock<SessionState>>,
        ctx: Context,
    ) -> Result<NodeResult, OrchestratorError> {
        let outcome = self.turn_loop.run(llm, &conv, &session_state, pause_policy, &ctx).await?;
        self.finish_llm_outcome(llm, conv, session_state, outcome).await
    }

    async fn resume_llm(
        &self,
        llm: &LlmNode,
        pause_policy: PausePolicy,
        pending: &PendingApproval,
        approved: bool,
        conv: Arc<tokio::sync::Mutex<Conversation>>,
        session_state: Arc<RwLock<SessionState>>,
        ctx: Context,
    ) -> Result<NodeResult, OrchestratorError> {
        let outcome = if pending.is_proxy() {
            self.turn_loop
                .resume_proxy(llm, &conv, &session_state, pause_policy, pending, approved, &ctx)
                .await?
        } else {
            self.turn_loop
                .resume_local(llm, &conv, &session_state, pause_policy, pending, approved, &ctx)
                .await?
        };
        self.finish_llm_outcome(llm, conv, session_state, outcome).await
    }

    async fn finish_llm_outcome(
        &self,
        llm: &LlmNode,
        conv: Arc<tokio::sync::Mutex<Conversation>>,
        session_state: Arc<RwLock<SessionState>>,
        outcome: LeafOutcome,
    ) -> Result<NodeResult, OrchestratorError> {
        match outcome {
            LeafOutcome::Completed(text) => {
                if let Some(key) = &llm.output_key {
                    session_state.write().set(key.clone(), text.clone());
                }
                Ok(NodeResult::Completed(Some(text)))
            }
            LeafOutcome::ExitLoop => Ok(NodeResult::ExitLoop),
            LeafOutcome::Paused(PendingKind::LocalTool {
                tool_name,
                tool_args,
                description,
            }) => {
                let conversation_id = conv.lock().await.id;
                let approval = PendingApproval::new(conversation_id, tool_name, tool_args, description);
                Ok(NodeResult::Paused {
                    approval,
                    path: vec![],
                    output_key: llm.output_key.clone().unwrap_or_default(),
                })
            }
            LeafOutcome::Paused(PendingKind::Proxy {
                remote_task_id,
                remote_agent_name,
                description,
            }) => {
                let conversation_id = conv.lock().await.id;
                let approval = PendingApproval::proxy(conversation_id, description, remote_task_id, remote_agent_name);
                Ok(NodeResult::Paused {
                    approval,
                    path: vec![],
                    output_key: llm.output_key.clone().unwrap_or_default(),
                })
            }
        }
    }

    // -- A2a leaf -----------------------------------------------------------

    async fn execute_a2a(
        &self,
        node: &A2aNode,
        conv: Arc<tokio::sync::Mutex<Conversation>>,
        session_state: Arc<RwLock<SessionState>>,
        ctx: Context,
    ) -> Result<NodeResult, OrchestratorError> {
        let message = session_state.read().resolve_placeholders(&node.message);
        let task = self.a2a.send_message(&node.peer, None, &message, &ctx).await?;
        match task.state {
            TaskState::Completed => {
                let artifact = task.artifact.clone().unwrap_or_default();
                if let Some(key) = &node.output_key {
                    session_state.write().set(key.clone(), artifact.clone());
                }
                Ok(NodeResult::Completed(Some(artifact)))
            }
            TaskState::InputRequired => {
                let destructive = self.a2a.peer_config(&node.peer).map(|c| c.destructive_hint).unwrap_or(false);
                if !destructive {
                    return Err(OrchestratorError::from(A2aError::UnexpectedInputRequired {
                        peer: node.peer.clone(),
                        state: task.state,
                    }));
                }
                let conversation_id = conv.lock().await.id;
                let approval = PendingApproval::proxy(
                    conversation_id,
                    format!("downstream agent '{}' requires approval", node.peer),
                    task.id,
                    node.peer.clone(),
                );
                Ok(NodeResult::Paused {
                    approval,
                    path: vec![],
                    output_key: node.output_key.clone().unwrap_or_default(),
                })
            }
        }
    }

    async fn resume_a2a(
        &self,
        node: &A2aNode,
        pending: &PendingApproval,
        approved: bool,
        conv: Arc<tokio::sync::Mutex<Conversation>>,
        session_state: Arc<RwLock<SessionState>>,
        ctx: Context,
    ) -> Result<NodeResult, OrchestratorError> {
        let peer_name = pending.remote_agent_name.clone().unwrap_or_default();
        let remote_task_id = pending.remote_task_id.clone().unwrap_or_default();
        let task = self.a2a.forward_decision(&peer_name, &remote_task_id, approved, &ctx).await?;
        match task.state {
            TaskState::Completed => {
                let artifact = task.artifact.clone().unwrap_or_default();
                if let Some(key) = &node.output_key {
                    session_state.write().set(key.clone(), artifact.clone());
                }
                Ok(NodeResult::Completed(Some(artifact)))
            }
            TaskState::InputRequired => {
                let conversation_id = conv.lock().await.id;
                let approval = PendingApproval::proxy(
                    conversation_id,
                    format!("downstream agent '{peer_name}' requires further approval"),
                    task.id,
                    peer_name,
                );
                Ok(NodeResult::Paused {
                    approval,
                    path: vec![],
                    output_key: node.output_key.clone().unwrap_or_default(),
                })
            }
        }
    }

    // -- Sequential -----------------------------------------------------------

    /// Run `children[start_idx..]` in order, seeded with whatever output the
    /// caller already has (empty for a fresh run, the resumed child's output
    /// when continuing after a pause).
    async fn sequential_tail(
        &self,
        children: &[Node],
        start_idx: usize,
        mut last_output: Option<String>,
        output_key: Option<&str>,
        conv: Arc<tokio::sync::Mutex<Conversation>>,
        session_state: Arc<RwLock<SessionState>>,
        ctx: Context,
    ) -> Result<NodeResult, OrchestratorError> {
        for (offset, child) in children[start_idx..].iter().enumerate() {
            let child_idx = start_idx + offset;
            match self
                .execute_node(child, PausePolicy::Pause, conv.clone(), session_state.clone(), ctx.clone())
                .await?
            {
                NodeResult::Completed(out) => last_output = out,
                NodeResult::ExitLoop => return Ok(NodeResult::ExitLoop),
                NodeResult::Paused { approval, path, output_key: ok } => {
                    let mut full_path = vec![child_idx];
                    full_path.extend(path);
                    return Ok(NodeResult::Paused { approval, path: full_path, output_key: ok });
                }
            }
        }
        if let (Some(key), Some(value)) = (output_key, &last_output) {
            session_state.write().set(key.to_string(), value.clone());
        }
        Ok(NodeResult::Completed(last_output))
    }

    async fn resume_sequential(
        &self,
        children: &[Node],
        output_key: Option<&str>,
        path: &[usize],
        pending: &PendingApproval,
        approved: bool,
        conv: Arc<tokio::sync::Mutex<Conversation>>,
        session_state: Arc<RwLock<SessionState>>,
        ctx: Context,
    ) -> Result<NodeResult, OrchestratorError> {
        let (idx, rest) = path
            .split_first()
            .ok_or_else(|| OrchestratorError::Config("malformed pause path at sequential node".to_string()))?;
        let idx = *idx;

        let resumed = self
            .resume_node(&children[idx], rest, PausePolicy::Pause, pending, approved, conv.clone(), session_state.clone(), ctx.clone())
            .await?;
        let last_output = match resumed {
            NodeResult::Completed(out) => out,
            NodeResult::ExitLoop => return Ok(NodeResult::ExitLoop),
            NodeResult::Paused { approval, path: sub_path, output_key: ok } => {
                let mut full_path = vec![idx];
                full_path.extend(sub_path);
                return Ok(NodeResult::Paused { approval, path: full_path, output_key: ok });
            }
        };

        self.sequential_tail(children, idx + 1, last_output, output_key, conv, session_state, ctx).await
    }

    // -- Parallel -----------------------------------------------------------

    async fn execute_parallel(
        &self,
        children: &[Node],
        output_key: Option<&str>,
        conv: Arc<tokio::sync::Mutex<Conversation>>,
        session_state: Arc<RwLock<SessionState>>,
        ctx: Context,
    ) -> Result<NodeResult, OrchestratorError> {
        let futures = children.iter().enumerate().map(|(idx, child)| {
            let conv = conv.clone();
            let session_state = session_state.clone();
            let ctx = ctx.clone();
            async move {
                let result = self.execute_node(child, PausePolicy::ExecuteImmediately, conv, session_state, ctx).await;
                (idx, result)
            }
        });

        let mut results = join_all(futures).await;
        results.sort_by_key(|(idx, _)| *idx);
        self.collect_parallel_results(results, output_key, &session_state)
    }

    async fn resume_parallel(
        &self,
        children: &[Node],
        output_key: Option<&str>,
        path: &[usize],
        pending: &PendingApproval,
        approved: bool,
        conv: Arc<tokio::sync::Mutex<Conversation>>,
        session_state: Arc<RwLock<SessionState>>,
        ctx: Context,
    ) -> Result<NodeResult, OrchestratorError> {
        let (idx, rest) = path
            .split_first()
            .ok_or_else(|| OrchestratorError::Config("malformed pause path at parallel node".to_string()))?;
        let idx = *idx;

        // Every sibling already ran to completion before the composite
        // paused (§9): only the one paused branch needs resuming.
        match self
            .resume_node(&children[idx], rest, PausePolicy::ExecuteImmediately, pending, approved, conv, session_state.clone(), ctx)
            .await?
        {
            NodeResult::Completed(out) => {
                if let (Some(key), Some(value)) = (output_key, &out) {
                    session_state.write().set(key.to_string(), value.clone());
                }
                Ok(NodeResult::Completed(out))
            }
            NodeResult::ExitLoop => Ok(NodeResult::ExitLoop),
            NodeResult::Paused { approval, path: sub_path, output_key: ok } => {
                let mut full_path = vec![idx];
                full_path.extend(sub_path);
                Ok(NodeResult::Paused { approval, path: full_path, output_key: ok })
            }
        }
    }

    fn collect_parallel_results(
        &self,
        results: Vec<(usize, Result<NodeResult, OrchestratorError>)>,
        output_key: Option<&str>,
        session_state: &RwLock<SessionState>,
    ) -> Result<NodeResult, OrchestratorError> {
        let mut results = results;
        if let Some(pos) = results.iter().position(|(_, r)| r.is_err()) {
            let (_, r) = results.remove(pos);
            return Err(r.unwrap_err());
        }

        let mut outcomes: Vec<(usize, NodeResult)> = results.into_iter().map(|(i, r)| (i, r.unwrap())).collect();

        if let Some(pos) = outcomes.iter().position(|(_, o)| matches!(o, NodeResult::ExitLoop)) {
            outcomes.remove(pos);
            return Ok(NodeResult::ExitLoop);
        }

        if let Some(pos) = outcomes.iter().position(|(_, o)| matches!(o, NodeResult::Paused { .. })) {
            let (idx, outcome) = outcomes.remove(pos);
            if let NodeResult::Paused { approval, path, output_key: ok } = outcome {
                let mut full_path = vec![idx];
                full_path.extend(path);
                return Ok(NodeResult::Paused { approval, path: full_path, output_key: ok });
            }
        }

        let combined = outcomes
            .into_iter()
            .filter_map(|(_, o)| match o {
                NodeResult::Completed(v) => v,
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if let Some(key) = output_key {
            session_state.write().set(key.to_string(), combined.clone());
        }
        Ok(NodeResult::Completed(Some(combined)))
    }

    // -- Loop -----------------------------------------------------------

    async fn loop_iteration_tail(
        &self,
        children: &[Node],
        start_idx: usize,
        mut last_output: Option<String>,
        conv: Arc<tokio::sync::Mutex<Conversation>>,
        session_state: Arc<RwLock<SessionState>>,
        ctx: Context,
    ) -> Result<LoopChildOutcome, OrchestratorError> {
        for (offset, child) in children[start_idx..].iter().enumerate() {
            let child_idx = start_idx + offset;
            match self
                .execute_node(child, PausePolicy::ExecuteImmediately, conv.clone(), session_state.clone(), ctx.clone())
                .await?
            {
                NodeResult::Completed(out) => last_output = out,
                NodeResult::ExitLoop => return Ok(LoopChildOutcome::ExitLoop),
                NodeResult::Paused { approval, path, output_key } => {
                    let mut full_path = vec![child_idx];
                    full_path.extend(path);
                    return Ok(LoopChildOutcome::Paused { approval, path: full_path, output_key });
                }
            }
        }
        Ok(LoopChildOutcome::Completed(last_output))
    }

    async fn execute_loop(
        &self,
        children: &[Node],
        max_iterations: u32,
        output_key: Option<&str>,
        conv: Arc<tokio::sync::Mutex<Conversation>>,
        session_state: Arc<RwLock<SessionState>>,
        ctx: Context,
    ) -> Result<NodeResult, OrchestratorError> {
        let mut last_output = None;
        for iteration in 0..max_iterations {
            match self
                .loop_iteration_tail(children, 0, None, conv.clone(), session_state.clone(), ctx.clone())
                .await?
            {
                LoopChildOutcome::Completed(out) => last_output = out,
                LoopChildOutcome::ExitLoop => break,
                LoopChildOutcome::Paused { approval, path, output_key: ok } => {
                    let mut full_path = vec![iteration as usize];
                    full_path.extend(path);
                    return Ok(NodeResult::Paused { approval, path: full_path, output_key: ok });
                }
            }
        }
        if let (Some(key), Some(value)) = (output_key, &last_output) {
            session_state.write().set(key.to_string(), value.clone());
        }
        Ok(NodeResult::Completed(last_output))
    }

    async fn resume_loop(
        &self,
        children: &[Node],
        max_iterations: u32,
        output_key: Option<&str>,
        path: &[usize],
        pending: &PendingApproval,
        approved: bool,
        conv: Arc<tokio::sync::Mutex<Conversation>>,
        session_state: Arc<RwLock<SessionState>>,
        ctx: Context,
    ) -> Result<NodeResult, OrchestratorError> {
        let (iteration, rest) = path
            .split_first()
            .ok_or_else(|| OrchestratorError::Config("malformed pause path at loop node".to_string()))?;
        let iteration = *iteration;
        let (idx, rest) = rest
            .split_first()
            .ok_or_else(|| OrchestratorError::Config("malformed pause path at loop node".to_string()))?;
        let idx = *idx;

        let resumed = self
            .resume_node(&children[idx], rest, PausePolicy::ExecuteImmediately, pending, approved, conv.clone(), session_state.clone(), ctx.clone())
            .await?;
        let (mut last_output, mut exited) = match resumed {
            NodeResult::Completed(out) => (out, false),
            NodeResult::ExitLoop => (None, true),
            NodeResult::Paused { approval, path: sub_path, output_key: ok } => {
                let mut full_path = vec![iteration, idx];
                full_path.extend(sub_path);
                return Ok(NodeResult::Paused { approval, path: full_path, output_key: ok });
            }
        };

        if !exited {
            match self
                .loop_iteration_tail(children, idx + 1, last_output, conv.clone(), session_state.clone(), ctx.clone())
                .await?
            {
                LoopChildOutcome::Completed(out) => last_output = out,
                LoopChildOutcome::ExitLoop => exited = true,
                LoopChildOutcome::Paused { approval, path: sub_path, output_key: ok } => {
                    let mut full_path = vec![iteration];
                    full_path.extend(sub_path);
                    return Ok(NodeResult::Paused { approval, path: full_path, output_key: ok });
                }
            }
        }

        if !exited {
            for next_iteration in (iteration + 1)..max_iterations {
                match self
                    .loop_iteration_tail(children, 0, None, conv.clone(), session_state.clone(), ctx.clone())
                    .await?
                {
                    LoopChildOutcome::Completed(out) => last_output = out,
                    LoopChildOutcome::ExitLoop => break,
                    LoopChildOutcome::Paused { approval, path: sub_path, output_key: ok } => {
                        let mut full_path = vec![next_iteration];
                        full_path.extend(sub_path);
                        return Ok(NodeResult::Paused { approval, path: full_path, output_key: ok });
                    }
                }
            }
        }

        if let (Some(key), Some(value)) = (output_key, &last_output) {
            session_state.write().set(key.to_string(), value.clone());
        }
        Ok(NodeResult::Completed(last_output))
    }
}

/// The tree a run walks: the configured `agent` tree verbatim, or — when
/// absent — an implicit single `llm` node in "simple mode" (§6 Configuration)
/// using the top-level `prompt`/`llm.model` with every declared A2A peer
/// available as a synthetic tool.
fn effective_tree(config: &AppConfig) -> Node {
    config.agent.clone().unwrap_or_else(|| {
        Node::Llm(LlmNode {
            model: config.llm.model.clone(),
            prompt: config.prompt.clone(),
            a2a_peers: config.a2a.iter().map(|p| p.name.clone()).collect(),
            can_exit_loop: false,
            output_key: None,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::a2a::A2aClient;
    use crate::domain::conversation::ConversationStatus;
    use crate::domain::llm::{GenerationResult, LLMError, LLMProvider};
    use crate::domain::mcp::{MCPError, McpSubClient};
    use crate::domain::node::{LoopNode, ParallelNode, SequentialNode};
    use crate::domain::repository::RepositoryError;
    use crate::domain::tool::{ToolCall, ToolDescriptor, ToolInputSchema, EXIT_LOOP_TOOL};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    struct ScriptedProvider {
        steps: AsyncMutex<Vec<GenerationResult>>,
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn generate(&self, _: &str, _: &[Message], _: &[ToolDescriptor]) -> Result<GenerationResult, LLMError> {
            let mut steps = self.steps.lock().await;
            if steps.is_empty() {
                return Ok(GenerationResult::Text("done".to_string()));
            }
            Ok(steps.remove(0))
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    struct FakeMcpClient {
        tool_name: String,
        destructive: bool,
        call_count: AtomicUsize,
    }

    #[async_trait]
    impl McpSubClient for FakeMcpClient {
        fn server_name(&self) -> &str {
            "test"
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, MCPError> {
            Ok(vec![ToolDescriptor {
                name: self.tool_name.clone(),
                description: String::new(),
                input_schema: ToolInputSchema::empty_object(),
                destructive: self.destructive,
                server: String::new(),
            }])
        }

        async fn call(&self, _tool_name: &str, args: Value, _ctx: &Context) -> Result<Value, MCPError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "ok": args }))
        }

        async fn stop(&self) -> Result<(), MCPError> {
            Ok(())
        }
    }

    struct InMemoryStore {
        conversations: AsyncMutex<HashMap<Uuid, Conversation>>,
    }

    impl InMemoryStore {
        fn new() -> Self {
            Self {
                conversations: AsyncMutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl ConversationStore for InMemoryStore {
        async fn get(&self, id: ConversationId) -> Result<Conversation, RepositoryError> {
            self.conversations.lock().await.get(&id).cloned().ok_or(RepositoryError::NotFound(id))
        }

        async fn list(&self) -> Result<Vec<Conversation>, RepositoryError> {
            Ok(self.conversations.lock().await.values().cloned().collect())
        }

        async fn save(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
            self.conversations.lock().await.insert(conversation.id, conversation.clone());
            Ok(())
        }

        async fn find_by_approval_uuid(&self, uuid: Uuid) -> Result<Conversation, RepositoryError> {
            self.conversations
                .lock()
                .await
                .values()
                .find(|c| c.pending_approval.as_ref().map(|a| a.uuid) == Some(uuid))
                .cloned()
                .ok_or(RepositoryError::ApprovalNotFound(uuid))
        }

        async fn claim_approval(&self, uuid: Uuid) -> Result<Conversation, RepositoryError> {
            let mut conversations = self.conversations.lock().await;
            let id = conversations
                .values()
                .find(|c| c.pending_approval.as_ref().map(|a| a.uuid) == Some(uuid))
                .map(|c| c.id)
                .ok_or(RepositoryError::ApprovalNotFound(uuid))?;
            let conversation = conversations.get_mut(&id).expect("id just found above");
            let claimed = conversation.clone();
            conversation.clear_approval();
            Ok(claimed)
        }
    }

    fn test_config() -> AppConfig {
        AppConfig {
            name: "test-agent".to_string(),
            description: String::new(),
            prompt: "you manage resources".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: "./data".to_string(),
            llm: crate::domain::config::LlmConfig {
                model: "test:model".to_string(),
                providers: vec![],
            },
            mcp_servers: vec![],
            a2a: vec![],
            agent: None,
        }
    }

    async fn orchestrator_with(
        tree: Option<Node>,
        tool_name: &str,
        destructive: bool,
        steps: Vec<GenerationResult>,
    ) -> (Orchestrator, Arc<InMemoryStore>, Arc<FakeMcpClient>) {
        let mut config = test_config();
        config.agent = tree;
        let provider = Arc::new(ScriptedProvider {
            steps: AsyncMutex::new(steps),
        });
        let providers = Arc::new(ProviderRegistry::from_test_provider("test", provider));
        let mcp_client = Arc::new(FakeMcpClient {
            tool_name: tool_name.to_string(),
            destructive,
            call_count: AtomicUsize::new(0),
        });
        let mcp = McpComposite::start(vec![mcp_client.clone() as Arc<dyn McpSubClient>]).await.unwrap();
        let mcp = Arc::new(mcp);
        let a2a = Arc::new(A2aGateway::new(vec![]));
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = Orchestrator::new(&config, store.clone(), providers, mcp, a2a);
        (orchestrator, store, mcp_client)
    }

    fn llm_node(can_exit_loop: bool) -> Node {
        Node::Llm(LlmNode {
            model: "test:model".to_string(),
            prompt: "hi {x}".to_string(),
            a2a_peers: vec![],
            can_exit_loop,
            output_key: None,
        })
    }

    #[tokio::test]
    async fn simple_mode_completes_without_tool_calls() {
        let (orchestrator, _store, _mcp) = orchestrator_with(None, "unused", false, vec![]).await;
        let ctx = Context::new(None);
        let outcome = orchestrator
            .start(Uuid::new_v4(), "abcd1234".to_string(), "hello".to_string(), ctx)
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(text) if text == "done"));
    }

    #[tokio::test]
    async fn destructive_tool_under_sequential_pauses_then_resumes() {
        let tree = Node::Sequential(SequentialNode {
            children: vec![llm_node(false)],
            output_key: None,
        });
        let (orchestrator, _store, mcp) = orchestrator_with(
            Some(tree),
            "resources_add",
            true,
            vec![GenerationResult::ToolCall(ToolCall {
                name: "resources_add".to_string(),
                arguments: json!({ "name": "X" }),
            })],
        )
        .await;
        let conversation_id = Uuid::new_v4();
        let ctx = Context::new(None);
        let outcome = orchestrator
            .start(conversation_id, "abcd1234".to_string(), "add X".to_string(), ctx.clone())
            .await
            .unwrap();

        let approval_uuid = match outcome {
            RunOutcome::AwaitingApproval(uuid) => uuid,
            _ => panic!("expected a pending approval"),
        };
        assert_eq!(mcp.call_count.load(Ordering::SeqCst), 0);

        let resumed = orchestrator.resume_by_uuid(approval_uuid, true, ctx).await.unwrap();
        assert!(matches!(resumed, RunOutcome::Completed(_)));
        assert_eq!(mcp.call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_resolutions_of_the_same_approval_execute_the_tool_once() {
        let tree = Node::Sequential(SequentialNode {
            children: vec![llm_node(false)],
            output_key: None,
        });
        let (orchestrator, _store, mcp) = orchestrator_with(
            Some(tree),
            "resources_add",
            true,
            vec![GenerationResult::ToolCall(ToolCall {
                name: "resources_add".to_string(),
                arguments: json!({ "name": "X" }),
            })],
        )
        .await;
        let orchestrator = Arc::new(orchestrator);
        let conversation_id = Uuid::new_v4();
        let ctx = Context::new(None);
        let outcome = orchestrator
            .start(conversation_id, "abcd1234".to_string(), "add X".to_string(), ctx.clone())
            .await
            .unwrap();
        let approval_uuid = match outcome {
            RunOutcome::AwaitingApproval(uuid) => uuid,
            _ => panic!("expected a pending approval"),
        };

        let first = {
            let orchestrator = orchestrator.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { orchestrator.resume_by_uuid(approval_uuid, true, ctx).await })
        };
        let second = {
            let orchestrator = orchestrator.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { orchestrator.resume_by_uuid(approval_uuid, true, ctx).await })
        };
        let (first, second) = tokio::join!(first, second);
        let results = [first.unwrap(), second.unwrap()];

        let ok_count = results.iter().filter(|r| r.is_ok()).count();
        let not_found_count = results
            .iter()
            .filter(|r| matches!(r, Err(OrchestratorError::ApprovalNotFound(_))))
            .count();
        assert_eq!(ok_count, 1, "exactly one resolution should succeed");
        assert_eq!(not_found_count, 1, "the loser should see ApprovalNotFound");
        assert_eq!(mcp.call_count.load(Ordering::SeqCst), 1, "the tool must execute exactly once");
    }

    #[tokio::test]
    async fn destructive_tool_under_parallel_executes_without_pausing() {
        let tree = Node::Parallel(ParallelNode {
            children: vec![llm_node(false)],
            output_key: None,
        });
        let (orchestrator, _store, mcp) = orchestrator_with(
            Some(tree),
            "resources_add",
            true,
            vec![GenerationResult::ToolCall(ToolCall {
                name: "resources_add".to_string(),
                arguments: json!({}),
            })],
        )
        .await;
        let ctx = Context::new(None);
        let outcome = orchestrator
            .start(Uuid::new_v4(), "abcd1234".to_string(), "add X".to_string(), ctx)
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(_)));
        assert_eq!(mcp.call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn loop_exits_early_on_exit_loop_tool() {
        let tree = Node::Loop(LoopNode {
            children: vec![llm_node(true)],
            max_iterations: 5,
            output_key: None,
        });
        let (orchestrator, _store, _mcp) = orchestrator_with(
            Some(tree),
            "unused",
            false,
            vec![GenerationResult::ToolCall(ToolCall {
                name: EXIT_LOOP_TOOL.to_string(),
                arguments: json!({}),
            })],
        )
        .await;
        let ctx = Context::new(None);
        let outcome = orchestrator
            .start(Uuid::new_v4(), "abcd1234".to_string(), "go".to_string(), ctx)
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(text) if text.is_empty()));
    }

    #[tokio::test]
    async fn conversation_status_round_trips_through_the_store() {
        let (orchestrator, store, _mcp) = orchestrator_with(None, "unused", false, vec![]).await;
        let conversation_id = Uuid::new_v4();
        let ctx = Context::new(None);
        orchestrator
            .start(conversation_id, "abcd1234".to_string(), "hello".to_string(), ctx)
            .await
            .unwrap();
        let saved = store.get(conversation_id).await.unwrap();
        assert_eq!(saved.status, ConversationStatus::Completed);
    }
}
