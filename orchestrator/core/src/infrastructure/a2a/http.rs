// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::domain::a2a::{A2aClient, A2aError, Task, TaskState};
use crate::domain::context::Context;

const A2A_CALL_TIMEOUT_SECS: u64 = 30;

/// One HTTP JSON-RPC 2.0 client bound to a single peer's URL (§4.5, §6).
pub struct HttpA2aClient {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpA2aClient {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn rpc(&self, method: &'static str, params: Value, ctx: &Context) -> Result<Value, A2aError> {
        #[derive(Serialize)]
        struct RpcRequest {
            jsonrpc: &'static str,
            id: u64,
            method: &'static str,
            params: Value,
        }
        #[derive(Deserialize)]
        struct RpcResponse {
            #[serde(default)]
            result: Option<Value>,
            #[serde(default)]
            error: Option<RpcError>,
        }
        #[derive(Deserialize)]
        struct RpcError {
            message: String,
        }

        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_request_id(),
            method,
            params,
        };

        let mut req = self
            .client
            .post(&self.url)
            .timeout(Duration::from_secs(A2A_CALL_TIMEOUT_SECS))
            .json(&request);
        if let Some(token) = &ctx.bearer_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        req = req.header("X-Session-ID", &ctx.session_id);

        let response = req
            .send()
            .await
            .map_err(|e| A2aError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(A2aError::Transport(format!("HTTP {}", response.status())));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| A2aError::Protocol(e.to_string()))?;

        if let Some(err) = body.error {
            return Err(A2aError::Transport(err.message));
        }
        body.result.ok_or_else(|| A2aError::Protocol("response carried neither result nor error".to_string()))
    }
}

/// Wire shape of an A2A task as returned by `message/send`/`tasks/get`
/// (§6): `status.state` mirrors `TaskState`; the artifact (if any) is
/// flattened to its text content.
#[derive(Deserialize)]
struct WireTask {
    id: String,
    status: WireStatus,
    #[serde(default)]
    artifact: Option<WireArtifact>,
}

#[derive(Deserialize)]
struct WireStatus {
    state: String,
}

#[derive(Deserialize)]
struct WireArtifact {
    #[serde(default)]
    parts: Vec<WireArtifactPart>,
}

#[derive(Deserialize)]
struct WireArtifactPart {
    #[serde(default)]
    text: String,
}

fn into_task(wire: WireTask) -> Result<Task, A2aError> {
    let state = match wire.status.state.as_str() {
        "completed" => TaskState::Completed,
        "input-required" => TaskState::InputRequired,
        other => return Err(A2aError::Protocol(format!("unknown task state: {other}"))),
    };
    let artifact = wire.artifact.map(|a| {
        a.parts
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("")
    });
    Ok(Task {
        id: wire.id,
        state,
        artifact,
    })
}

#[async_trait]
impl A2aClient for HttpA2aClient {
    #[instrument(skip(self, ctx), fields(url = %self.url))]
    async fn send_message(&self, task_id: Option<&str>, message: &str, ctx: &Context) -> Result<Task, A2aError> {
        let mut params = serde_json::json!({
            "message": { "parts": [{ "text": message }] },
        });
        if let Some(id) = task_id {
            params["taskId"] = Value::String(id.to_string());
        }
        let result = self.rpc("message/send", params, ctx).await?;
        let wire: WireTask = serde_json::from_value(result).map_err(|e| A2aError::Protocol(e.to_string()))?;
        into_task(wire)
    }

    async fn get_task(&self, task_id: &str, ctx: &Context) -> Result<Task, A2aError> {
        let result = self
            .rpc("tasks/get", serde_json::json!({ "id": task_id }), ctx)
            .await?;
        let wire: WireTask = serde_json::from_value(result).map_err(|e| A2aError::Protocol(e.to_string()))?;
        into_task(wire)
    }
}
