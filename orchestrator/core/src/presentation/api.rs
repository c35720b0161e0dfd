// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! REST façade (§6): health, tool listing, conversation lifecycle, approval
//! resolution, the Agent Card, and the inbound A2A JSON-RPC endpoint. Every
//! handler is a thin translation into an `application` service call — the
//! orchestrator tree interpreter, the approval engine, and the MCP composite
//! own all real behavior.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::application::approval_engine::ApprovalEngine;
use crate::application::mcp_composite::McpComposite;
use crate::application::orchestrator::{Orchestrator, RunOutcome};
use crate::domain::a2a::is_approval_keyword;
use crate::domain::approval::ApprovalDecisionRequest;
use crate::domain::config::AppConfig;
use crate::domain::context::Context;
use crate::domain::conversation::{Conversation, ConversationStatus, MessageRole};
use crate::domain::repository::{ConversationStore, RepositoryError};
use crate::domain::OrchestratorError;

pub struct AppState {
    pub config: AppConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub approval_engine: Arc<ApprovalEngine>,
    pub mcp: Arc<McpComposite>,
    pub store: Arc<dyn ConversationStore>,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/conversations", get(list_conversations).post(create_conversation))
        .route("/conversations/:id", get(get_conversation))
        .route("/conversations/:id/messages", post(post_message))
        .route("/approvals/:uuid", post(post_approval))
        .route("/.well-known/agent.json", get(agent_card))
        .route("/a2a", post(a2a_rpc))
        .with_state(state)
}

fn context_from_headers(headers: &HeaderMap) -> Context {
    let bearer_token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    match headers.get("x-session-id").and_then(|v| v.to_str().ok()) {
        Some(session_id) => Context::with_session_id(bearer_token, session_id.to_string()),
        None => Context::new(bearer_token),
    }
}

// -- Health / tools ---------------------------------------------------------

async fn health() -> impl axum::response::IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

async fn list_tools(State(state): State<Arc<AppState>>) -> impl axum::response::IntoResponse {
    (StatusCode::OK, Json(state.mcp.tools().to_vec()))
}

// -- Conversations ------------------------------------------------------------

#[derive(Deserialize, Default)]
struct CreateConversationRequest {
    #[serde(default)]
    message: Option<String>,
}

async fn create_conversation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateConversationRequest>,
) -> impl axum::response::IntoResponse {
    let conversation_id = Uuid::new_v4();
    let ctx = context_from_headers(&headers);

    match request.message {
        Some(message) => {
            let session_id = ctx.session_id.clone();
            let outcome = state.orchestrator.start(conversation_id, session_id, message, ctx).await;
            run_outcome_response(outcome)
        }
        None => {
            let conversation = Conversation::new(conversation_id, ctx.session_id.clone());
            match state.store.save(&conversation).await {
                Ok(()) => (StatusCode::CREATED, Json(json!({ "id": conversation_id }))),
                Err(e) => repository_error_response(e),
            }
        }
    }
}

async fn list_conversations(State(state): State<Arc<AppState>>) -> impl axum::response::IntoResponse {
    match state.store.list().await {
        Ok(conversations) => (StatusCode::OK, Json(json!(conversations))),
        Err(e) => repository_error_response(e),
    }
}

async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl axum::response::IntoResponse {
    match state.store.get(id).await {
        Ok(conversation) => (StatusCode::OK, Json(json!(conversation))),
        Err(e) => repository_error_response(e),
    }
}

#[derive(Deserialize)]
struct PostMessageRequest {
    message: String,
}

async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<PostMessageRequest>,
) -> impl axum::response::IntoResponse {
    let ctx = context_from_headers(&headers);
    let session_id = ctx.session_id.clone();
    let outcome = state.orchestrator.start(id, session_id, request.message, ctx).await;
    run_outcome_response(outcome)
}

// -- Approvals ----------------------------------------------------------------

async fn post_approval(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<Uuid>,
    headers: HeaderMap,
    Json(decision): Json<ApprovalDecisionRequest>,
) -> impl axum::response::IntoResponse {
    let ctx = context_from_headers(&headers);
    let outcome = state.approval_engine.decide(uuid, decision, ctx).await;
    run_outcome_response(outcome)
}

// -- Agent Card -----------------------------------------------------------------

async fn agent_card(State(state): State<Arc<AppState>>) -> impl axum::response::IntoResponse {
    let skills: Vec<Value> = state
        .mcp
        .tools()
        .iter()
        .map(|tool| {
            json!({
                "id": tool.name,
                "name": tool.name,
                "description": tool.description,
            })
        })
        .collect();

    let card = json!({
        "name": state.config.name,
        "description": state.config.description,
        "url": format!("http://{}:{}/a2a", state.config.host, state.config.port),
        "skills": skills,
    });
    (StatusCode::OK, Json(card))
}

// -- Inbound A2A JSON-RPC -------------------------------------------------------

#[derive(Deserialize)]
struct JsonRpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Serialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct MessagePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Deserialize)]
struct MessageSendParams {
    message: WireMessage,
    #[serde(rename = "taskId", default)]
    task_id: Option<String>,
}

#[derive(Deserialize)]
struct TaskGetParams {
    id: String,
}

async fn a2a_rpc(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> impl axum::response::IntoResponse {
    let ctx = context_from_headers(&headers);
    let outcome = match request.method.as_str() {
        "message/send" => handle_message_send(&state, request.params, ctx).await,
        "tasks/get" => handle_tasks_get(&state, request.params).await,
        other => Err(JsonRpcError {
            code: -32601,
            message: format!("unknown method: {other}"),
        }),
    };

    let body = match outcome {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": request.id, "result": result }),
        Err(error) => json!({ "jsonrpc": "2.0", "id": request.id, "error": error }),
    };
    (StatusCode::OK, Json(body))
}

async fn handle_message_send(
    state: &AppState,
    params: Value,
    ctx: Context,
) -> Result<Value, JsonRpcError> {
    let params: MessageSendParams =
        serde_json::from_value(params).map_err(|e| invalid_params(e.to_string()))?;
    let text: String = params.message.parts.into_iter().map(|p| p.text).collect();

    match params.task_id {
        None => {
            let conversation_id = Uuid::new_v4();
            let session_id = ctx.session_id.clone();
            let outcome = state.orchestrator.start(conversation_id, session_id, text, ctx).await;
            task_from_outcome(conversation_id, outcome)
        }
        Some(task_id) => {
            let conversation_id =
                Uuid::parse_str(&task_id).map_err(|_| invalid_params("taskId is not a uuid".to_string()))?;
            let conversation = state
                .store
                .get(conversation_id)
                .await
                .map_err(|_| task_not_found(&task_id))?;
            let pending = conversation
                .pending_approval
                .ok_or_else(|| task_not_found(&task_id))?;
            let approved = is_approval_keyword(&text);
            let outcome = state.orchestrator.resume_by_uuid(pending.uuid, approved, ctx).await;
            task_from_outcome(conversation_id, outcome)
        }
    }
}

async fn handle_tasks_get(state: &AppState, params: Value) -> Result<Value, JsonRpcError> {
    let params: TaskGetParams =
        serde_json::from_value(params).map_err(|e| invalid_params(e.to_string()))?;
    let conversation_id =
        Uuid::parse_str(&params.id).map_err(|_| invalid_params("id is not a uuid".to_string()))?;
    let conversation = state
        .store
        .get(conversation_id)
        .await
        .map_err(|_| task_not_found(&params.id))?;

    match conversation.status {
        // §4.5: "active/completed -> completed". An `Active` conversation
        // has no distinct wire state of its own — it simply has no
        // assistant text yet.
        ConversationStatus::Active | ConversationStatus::Completed => Ok(wire_task(
            conversation_id,
            "completed",
            last_assistant_text(&conversation),
        )),
        ConversationStatus::WaitingApproval => {
            Ok(wire_task(conversation_id, "input-required", None))
        }
    }
}

fn task_from_outcome(
    conversation_id: Uuid,
    outcome: Result<RunOutcome, OrchestratorError>,
) -> Result<Value, JsonRpcError> {
    match outcome {
        Ok(RunOutcome::Completed(text)) => Ok(wire_task(conversation_id, "completed", Some(text))),
        Ok(RunOutcome::AwaitingApproval(_)) => Ok(wire_task(conversation_id, "input-required", None)),
        Err(OrchestratorError::AuthRequired) => Err(JsonRpcError {
            code: -32001,
            message: "authentication required".to_string(),
        }),
        Err(e) => Err(JsonRpcError {
            code: -32000,
            message: e.to_string(),
        }),
    }
}

fn wire_task(id: Uuid, state: &str, artifact: Option<String>) -> Value {
    json!({
        "id": id.to_string(),
        "status": { "state": state },
        "artifact": artifact.map(|text| json!({ "parts": [{ "text": text }] })),
    })
}

fn last_assistant_text(conversation: &Conversation) -> Option<String> {
    conversation
        .messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::Assistant && !m.content.is_empty())
        .map(|m| m.content.clone())
}

fn invalid_params(message: String) -> JsonRpcError {
    JsonRpcError { code: -32602, message }
}

fn task_not_found(task_id: &str) -> JsonRpcError {
    JsonRpcError {
        code: -32004,
        message: format!("unknown task id: {task_id}"),
    }
}

// -- Shared response helpers ----------------------------------------------------

fn run_outcome_response(outcome: Result<RunOutcome, OrchestratorError>) -> (StatusCode, Json<Value>) {
    match outcome {
        Ok(RunOutcome::Completed(text)) => (StatusCode::OK, Json(json!({ "message": text }))),
        Ok(RunOutcome::AwaitingApproval(uuid)) => (
            StatusCode::OK,
            Json(json!({ "waiting_approval": true, "approval": { "uuid": uuid } })),
        ),
        Err(OrchestratorError::AuthRequired) => {
            (StatusCode::OK, Json(json!({ "auth_required": true })))
        }
        Err(OrchestratorError::ApprovalNotFound(uuid)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no pending approval for uuid {uuid}") })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

fn repository_error_response(error: RepositoryError) -> (StatusCode, Json<Value>) {
    match error {
        RepositoryError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("conversation not found: {id}") })),
        ),
        RepositoryError::ApprovalNotFound(uuid) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no pending approval for uuid {uuid}") })),
        ),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": other.to_string() })),
        ),
    }
}
