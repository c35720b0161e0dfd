// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Turn Loop Application Service (§4.4).
//!
//! Inside an `llm` node: call the LLM Gateway with the resolved system
//! prompt, the conversation history, and the node's tool surface; either it
//! answers with text (done) or asks for a tool call, which is executed (or
//! deferred behind an approval, per the ancestor's pause policy) and
//! recorded as a new tool-role message before looping again.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::instrument;

use crate::application::a2a_gateway::A2aGateway;
use crate::application::mcp_composite::McpComposite;
use crate::domain::a2a::{A2aError, TaskState};
use crate::domain::approval::PendingApproval;
use crate::domain::context::Context;
use crate::domain::conversation::{Conversation, Message, ToolCallRecord};
use crate::domain::llm::{coerce_tool_call_arguments, GenerationResult};
use crate::domain::node::LlmNode;
use crate::domain::session_state::SessionState;
use crate::domain::tool::{ToolCall, ToolDescriptor, EXIT_LOOP_TOOL};
use crate::domain::OrchestratorError;
use crate::infrastructure::llm::registry::ProviderRegistry;

/// Whether a destructive call reached from this leaf must pause the run or
/// execute immediately, decided by the orchestrator from the nearest
/// composite ancestor on the path to this leaf (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PausePolicy {
    Pause,
    ExecuteImmediately,
}

/// What the loop produced at the point it stopped.
pub enum LeafOutcome {
    Completed(String),
    ExitLoop,
    Paused(PendingKind),
}

/// The deferred action a pause is waiting behind, independent of the
/// `PendingApproval` record the orchestrator mints from it.
pub enum PendingKind {
    LocalTool {
        tool_name: String,
        tool_args: Value,
        description: String,
    },
    Proxy {
        remote_task_id: String,
        remote_agent_name: String,
        description: String,
    },
}

/// Stateless over individual calls; holds only the shared collaborators an
/// `llm` node needs (§2). One instance is shared across every node in a run.
pub struct TurnLoop {
    providers: Arc<ProviderRegistry>,
    mcp: Arc<McpComposite>,
    a2a: Arc<A2aGateway>,
}

impl TurnLoop {
    pub fn new(providers: Arc<ProviderRegistry>, mcp: Arc<McpComposite>, a2a: Arc<A2aGateway>) -> Self {
        Self { providers, mcp, a2a }
    }

    /// Union of MCP composite tools, synthetic `a2a_<peer>` tools for this
    /// node's declared peers, and the synthetic `exit_loop` tool (§4.4).
    fn tool_surface(&self, node: &LlmNode) -> Vec<ToolDescriptor> {
        let mut tools: Vec<ToolDescriptor> = self.mcp.tools().to_vec();
        for peer_name in &node.a2a_peers {
            if let Some(cfg) = self.a2a.peer_config(peer_name) {
                tools.push(ToolDescriptor::synthetic_a2a_peer(
                    peer_name,
                    &cfg.description,
                    cfg.destructive_hint,
                ));
            }
        }
        if node.can_exit_loop {
            tools.push(ToolDescriptor::synthetic_exit_loop());
        }
        tools
    }

    /// Run a fresh turn loop at this `llm` node.
    #[instrument(skip_all, fields(model = %node.model))]
    pub async fn run(
        &self,
        node: &LlmNode,
        conv: &tokio::sync::Mutex<Conversation>,
        session_state: &RwLock<SessionState>,
        pause_policy: PausePolicy,
        ctx: &Context,
    ) -> Result<LeafOutcome, OrchestratorError> {
        let system_prompt = resolve(session_state, &node.prompt);
        let tools = self.tool_surface(node);
        self.drive(node, &system_prompt, &tools, conv, pause_policy, ctx).await
    }

    /// Resume after a local-tool approval decision (§4.3): record the
    /// deferred call's outcome (or "operation cancelled by user") as a
    /// tool-result message, then continue exactly as `run` would.
    #[instrument(skip_all, fields(model = %node.model, tool = %pending.tool_name))]
    pub async fn resume_local(
        &self,
        node: &LlmNode,
        conv: &tokio::sync::Mutex<Conversation>,
        session_state: &RwLock<SessionState>,
        pause_policy: PausePolicy,
        pending: &PendingApproval,
        approved: bool,
        ctx: &Context,
    ) -> Result<LeafOutcome, OrchestratorError> {
        if approved {
            match self.mcp.call(&pending.tool_name, pending.tool_args.clone(), ctx).await {
                Ok(value) => {
                    self.push_tool_result(conv, &pending.tool_name, pending.tool_args.clone(), value.to_string(), false)
                        .await;
                }
                Err(e) if e.is_fatal_to_run() => return Err(e),
                Err(e) => {
                    self.push_tool_result(
                        conv,
                        &pending.tool_name,
                        pending.tool_args.clone(),
                        format!("error: {e}"),
                        true,
                    )
                    .await;
                }
            }
        } else {
            self.push_tool_result(
                conv,
                &pending.tool_name,
                pending.tool_args.clone(),
                "operation cancelled by user".to_string(),
                false,
            )
            .await;
        }

        let system_prompt = resolve(session_state, &node.prompt);
        let tools = self.tool_surface(node);
        self.drive(node, &system_prompt, &tools, conv, pause_policy, ctx).await
    }

    /// Resume after a downstream A2A agent resolves a proxy approval
    /// (§4.3, §4.6): forward the decision, record the artifact (or re-pause
    /// if the peer asks for another round), then continue the loop.
    #[instrument(skip_all, fields(model = %node.model))]
    pub async fn resume_proxy(
        &self,
        node: &LlmNode,
        conv: &tokio::sync::Mutex<Conversation>,
        session_state: &RwLock<SessionState>,
        pause_policy: PausePolicy,
        pending: &PendingApproval,
        approved: bool,
        ctx: &Context,
    ) -> Result<LeafOutcome, OrchestratorError> {
        let peer_name = pending.remote_agent_name.clone().unwrap_or_default();
        let remote_task_id = pending.remote_task_id.clone().unwrap_or_default();

        let task = self.a2a.forward_decision(&peer_name, &remote_task_id, approved, ctx).await?;
        match task.state {
            TaskState::Completed => {
                self.push_tool_result(
                    conv,
                    &format!("a2a_{peer_name}"),
                    Value::Null,
                    task.artifact.clone().unwrap_or_default(),
                    false,
                )
                .await;

                let system_prompt = resolve(session_state, &node.prompt);
                let tools = self.tool_surface(node);
                self.drive(node, &system_prompt, &tools, conv, pause_policy, ctx).await
            }
            TaskState::InputRequired => Ok(LeafOutcome::Paused(PendingKind::Proxy {
                remote_task_id: task.id,
                remote_agent_name: peer_name.clone(),
                description: format!("downstream agent '{peer_name}' requires further approval"),
            })),
        }
    }

    async fn push_tool_result(
        &self,
        conv: &tokio::sync::Mutex<Conversation>,
        name: &str,
        arguments: Value,
        result: String,
        is_error: bool,
    ) {
        let record = ToolCallRecord {
            name: name.to_string(),
            arguments,
            result: Some(result),
            is_error,
        };
        conv.lock().await.push_message(Message::tool_result(record));
    }

    /// The generate → act → append loop shared by `run` and the two resume
    /// paths, once the conversation already reflects whatever preceding
    /// state the caller prepared (the initial user message, or a just
    /// resolved tool result).
    async fn drive(
        &self,
        node: &LlmNode,
        system_prompt: &str,
        tools: &[ToolDescriptor],
        conv: &tokio::sync::Mutex<Conversation>,
        pause_policy: PausePolicy,
        ctx: &Context,
    ) -> Result<LeafOutcome, OrchestratorError> {
        loop {
            if ctx.is_cancelled() {
                return Err(OrchestratorError::Cancelled);
            }
            let history = conv.lock().await.messages.clone();
            let generation = tokio::select! {
                _ = ctx.cancellation.cancelled() => return Err(OrchestratorError::Cancelled),
                result = self.providers.generate(&node.model, system_prompt, &history, tools) => result?,
            };

            let mut call = match generation {
                GenerationResult::Text(text) => {
                    conv.lock().await.push_message(Message::assistant(text.clone()));
                    return Ok(LeafOutcome::Completed(text));
                }
                GenerationResult::ToolCall(call) => call,
            };

            if call.name == EXIT_LOOP_TOOL {
                let record = ToolCallRecord {
                    name: call.name,
                    arguments: call.arguments,
                    result: Some("loop exited".to_string()),
                    is_error: false,
                };
                conv.lock().await.push_message(Message::assistant_tool_call(record));
                return Ok(LeafOutcome::ExitLoop);
            }

            if let Some(peer_name) = call.name.strip_prefix("a2a_") {
                if !node.a2a_peers.iter().any(|p| p == peer_name) {
                    self.push_tool_result(
                        conv,
                        &call.name,
                        call.arguments.clone(),
                        format!("error: tool not found: {}", call.name),
                        true,
                    )
                    .await;
                    continue;
                }
                match self.dispatch_a2a(peer_name, &call, conv, ctx).await? {
                    Some(outcome) => return Ok(outcome),
                    None => continue,
                }
            }

            let Some(tool) = tools.iter().find(|t| t.name == call.name).cloned() else {
                self.push_tool_result(
                    conv,
                    &call.name,
                    call.arguments.clone(),
                    format!("error: tool not found: {}", call.name),
                    true,
                )
                .await;
                continue;
            };
            coerce_tool_call_arguments(&tool, &mut call);

            if tool.destructive && pause_policy == PausePolicy::Pause {
                let record = ToolCallRecord {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    result: None,
                    is_error: false,
                };
                conv.lock().await.push_message(Message::assistant_tool_call(record));
                let description = format!("call {} with arguments {}", call.name, call.arguments);
                return Ok(LeafOutcome::Paused(PendingKind::LocalTool {
                    tool_name: call.name.clone(),
                    tool_args: call.arguments.clone(),
                    description,
                }));
            }

            match self.mcp.call(&call.name, call.arguments.clone(), ctx).await {
                Ok(value) => {
                    self.push_tool_result(conv, &call.name, call.arguments.clone(), value.to_string(), false)
                        .await;
                }
                Err(e) if e.is_fatal_to_run() => return Err(e),
                Err(e) => {
                    self.push_tool_result(conv, &call.name, call.arguments.clone(), format!("error: {e}"), true)
                        .await;
                }
            }
        }
    }

    /// Initial `a2a_<peer>` delegation inside the turn loop (§4.4). `Some`
    /// stops the loop (proxy pause); `None` continues it (the delegation
    /// completed and its artifact is already recorded).
    async fn dispatch_a2a(
        &self,
        peer_name: &str,
        call: &ToolCall,
        conv: &tokio::sync::Mutex<Conversation>,
        ctx: &Context,
    ) -> Result<Option<LeafOutcome>, OrchestratorError> {
        let message = call
            .arguments
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let record = ToolCallRecord {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            result: None,
            is_error: false,
        };
        conv.lock().await.push_message(Message::assistant_tool_call(record));

        let task = self.a2a.send_message(peer_name, None, &message, ctx).await?;
        match task.state {
            TaskState::Completed => {
                self.push_tool_result(
                    conv,
                    &call.name,
                    call.arguments.clone(),
                    task.artifact.clone().unwrap_or_default(),
                    false,
                )
                .await;
                Ok(None)
            }
            TaskState::InputRequired => {
                let destructive = self.a2a.peer_config(peer_name).map(|c| c.destructive_hint).unwrap_or(false);
                if destructive {
                    Ok(Some(LeafOutcome::Paused(PendingKind::Proxy {
                        remote_task_id: task.id,
                        remote_agent_name: peer_name.to_string(),
                        description: format!("downstream agent '{peer_name}' requires approval"),
                    })))
                } else {
                    Err(OrchestratorError::from(A2aError::UnexpectedInputRequired {
                        peer: peer_name.to_string(),
                        state: task.state,
                    }))
                }
            }
        }
    }
}

fn resolve(session_state: &RwLock<SessionState>, template: &str) -> String {
    session_state.read().resolve_placeholders(template)
}
