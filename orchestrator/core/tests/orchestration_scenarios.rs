// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end orchestration scenarios driven entirely through the public
//! `Orchestrator` API: a sequential pipeline that pauses mid-tree and
//! resumes with session state threaded across nodes, an A2A delegation that
//! requires downstream approval, and an LLM provider failure that must
//! bubble up as an authentication requirement rather than a tool error.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use loom_orchestrator_core::application::a2a_gateway::A2aGateway;
use loom_orchestrator_core::application::mcp_composite::McpComposite;
use loom_orchestrator_core::application::orchestrator::{Orchestrator, RunOutcome};
use loom_orchestrator_core::domain::a2a::{A2aClient, A2aError, Task, TaskState};
use loom_orchestrator_core::domain::config::{AppConfig, LlmConfig};
use loom_orchestrator_core::domain::context::Context;
use loom_orchestrator_core::domain::conversation::ConversationStatus;
use loom_orchestrator_core::domain::llm::{GenerationResult, LLMError, LLMProvider};
use loom_orchestrator_core::domain::mcp::{MCPError, McpSubClient};
use loom_orchestrator_core::domain::node::{A2aNode, LlmNode, Node, SequentialNode};
use loom_orchestrator_core::domain::repository::ConversationStore;
use loom_orchestrator_core::domain::tool::{ToolCall, ToolDescriptor, ToolInputSchema};
use loom_orchestrator_core::infrastructure::llm::registry::ProviderRegistry;
use loom_orchestrator_core::infrastructure::storage::JsonFileConversationStore;
use loom_orchestrator_core::OrchestratorError;

fn base_config() -> AppConfig {
    AppConfig {
        name: "scenario-agent".to_string(),
        description: String::new(),
        prompt: "you manage resources".to_string(),
        host: "127.0.0.1".to_string(),
        port: 8080,
        data_dir: "./data".to_string(),
        llm: LlmConfig {
            model: "test:model".to_string(),
            providers: vec![],
        },
        mcp_servers: vec![],
        a2a: vec![],
        agent: None,
    }
}

// -- Scenario: sequential pipeline pause/resume with output_key threading ---

struct SequentialScriptedProvider {
    steps: tokio::sync::Mutex<Vec<GenerationResult>>,
}

#[async_trait]
impl LLMProvider for SequentialScriptedProvider {
    async fn generate(
        &self,
        _system_prompt: &str,
        _history: &[loom_orchestrator_core::domain::conversation::Message],
        _tools: &[ToolDescriptor],
    ) -> Result<GenerationResult, LLMError> {
        let mut steps = self.steps.lock().await;
        if steps.is_empty() {
            return Ok(GenerationResult::Text("fallback".to_string()));
        }
        Ok(steps.remove(0))
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        Ok(())
    }
}

struct DestructiveAddClient {
    call_count: AtomicUsize,
}

#[async_trait]
impl McpSubClient for DestructiveAddClient {
    fn server_name(&self) -> &str {
        "resources"
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, MCPError> {
        Ok(vec![ToolDescriptor {
            name: "resources_add".to_string(),
            description: "add a resource".to_string(),
            input_schema: ToolInputSchema::empty_object(),
            destructive: true,
            server: String::new(),
        }])
    }

    async fn call(&self, _tool_name: &str, args: serde_json::Value, _ctx: &Context) -> Result<serde_json::Value, MCPError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "added": args }))
    }

    async fn stop(&self) -> Result<(), MCPError> {
        Ok(())
    }
}

#[tokio::test]
async fn sequential_pipeline_pauses_at_first_child_and_threads_output_key_on_resume() {
    let tree = Node::Sequential(SequentialNode {
        children: vec![
            Node::Llm(LlmNode {
                model: "test:model".to_string(),
                prompt: "add a resource".to_string(),
                a2a_peers: vec![],
                can_exit_loop: false,
                output_key: Some("a".to_string()),
            }),
            Node::Llm(LlmNode {
                model: "test:model".to_string(),
                prompt: "based on {a}, summarize".to_string(),
                a2a_peers: vec![],
                can_exit_loop: false,
                output_key: None,
            }),
        ],
        output_key: None,
    });

    let mut config = base_config();
    config.agent = Some(tree);

    let provider = Arc::new(SequentialScriptedProvider {
        steps: tokio::sync::Mutex::new(vec![
            GenerationResult::ToolCall(ToolCall {
                name: "resources_add".to_string(),
                arguments: json!({ "name": "X" }),
            }),
            GenerationResult::Text("added X".to_string()),
            GenerationResult::Text("summary: added X".to_string()),
        ]),
    });
    let providers = Arc::new(ProviderRegistry::from_test_provider("test", provider));
    let mcp_client = Arc::new(DestructiveAddClient {
        call_count: AtomicUsize::new(0),
    });
    let mcp = Arc::new(
        McpComposite::start(vec![mcp_client.clone() as Arc<dyn McpSubClient>])
            .await
            .unwrap(),
    );
    let a2a = Arc::new(A2aGateway::new(vec![]));
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ConversationStore> = Arc::new(JsonFileConversationStore::open(dir.path()).await.unwrap());
    let orchestrator = Orchestrator::new(&config, store.clone(), providers, mcp, a2a);

    let conversation_id = Uuid::new_v4();
    let ctx = Context::new(None);
    let outcome = orchestrator
        .start(conversation_id, "abcd1234".to_string(), "add resource X".to_string(), ctx.clone())
        .await
        .unwrap();

    let approval_uuid = match outcome {
        RunOutcome::AwaitingApproval(uuid) => uuid,
        other => panic!("expected a pending approval, got {other:?}"),
    };
    assert_eq!(mcp_client.call_count.load(Ordering::SeqCst), 0);

    let saved = store.get(conversation_id).await.unwrap();
    assert_eq!(saved.status, ConversationStatus::WaitingApproval);

    let resumed = orchestrator.resume_by_uuid(approval_uuid, true, ctx).await.unwrap();
    match resumed {
        RunOutcome::Completed(text) => assert_eq!(text, "summary: added X"),
        other => panic!("expected the run to complete, got {other:?}"),
    }
    assert_eq!(mcp_client.call_count.load(Ordering::SeqCst), 1);

    let saved = store.get(conversation_id).await.unwrap();
    assert_eq!(saved.status, ConversationStatus::Completed);
}

// -- Scenario: A2A delegation requires downstream approval, then resolves --

struct InputRequiredThenCompleteA2aClient {
    completed_after_approval: bool,
}

#[async_trait]
impl A2aClient for InputRequiredThenCompleteA2aClient {
    async fn send_message(&self, task_id: Option<&str>, _message: &str, _ctx: &Context) -> Result<Task, A2aError> {
        if task_id.is_none() {
            return Ok(Task {
                id: "remote-task-1".to_string(),
                state: TaskState::InputRequired,
                artifact: None,
            });
        }
        if self.completed_after_approval {
            Ok(Task {
                id: "remote-task-1".to_string(),
                state: TaskState::Completed,
                artifact: Some("remote work done".to_string()),
            })
        } else {
            Ok(Task {
                id: "remote-task-1".to_string(),
                state: TaskState::InputRequired,
                artifact: None,
            })
        }
    }

    async fn get_task(&self, _task_id: &str, _ctx: &Context) -> Result<Task, A2aError> {
        unimplemented!("not exercised by this scenario")
    }
}

#[tokio::test]
async fn a2a_delegation_pauses_for_downstream_approval_then_completes() {
    use loom_orchestrator_core::domain::a2a::A2aPeerConfig;

    let peer_config = A2aPeerConfig {
        name: "peer-b".to_string(),
        url: "http://peer-b.invalid/a2a".to_string(),
        description: "downstream agent B".to_string(),
        destructive_hint: true,
    };
    let client: Arc<dyn A2aClient> = Arc::new(InputRequiredThenCompleteA2aClient {
        completed_after_approval: true,
    });

    let tree = Node::A2a(A2aNode {
        peer: "peer-b".to_string(),
        message: "please do the thing".to_string(),
        output_key: None,
    });
    let mut config = base_config();
    config.a2a = vec![peer_config.clone()];
    config.agent = Some(tree);

    let providers = Arc::new(ProviderRegistry::from_config(&[]).unwrap());
    let mcp = Arc::new(McpComposite::start(vec![]).await.unwrap());
    let a2a = Arc::new(A2aGateway::new(vec![(peer_config, client)]));
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ConversationStore> = Arc::new(JsonFileConversationStore::open(dir.path()).await.unwrap());
    let orchestrator = Orchestrator::new(&config, store.clone(), providers, mcp, a2a);

    let conversation_id = Uuid::new_v4();
    let ctx = Context::new(None);
    let outcome = orchestrator
        .start(conversation_id, "abcd1234".to_string(), "delegate this".to_string(), ctx.clone())
        .await
        .unwrap();

    let approval_uuid = match outcome {
        RunOutcome::AwaitingApproval(uuid) => uuid,
        other => panic!("expected a proxied pending approval, got {other:?}"),
    };

    let resumed = orchestrator.resume_by_uuid(approval_uuid, true, ctx).await.unwrap();
    match resumed {
        RunOutcome::Completed(text) => assert_eq!(text, "remote work done"),
        other => panic!("expected completion with the remote artifact, got {other:?}"),
    }
}

// -- Scenario: provider authentication failure bubbles up without pausing --

struct UnauthenticatedProvider;

#[async_trait]
impl LLMProvider for UnauthenticatedProvider {
    async fn generate(
        &self,
        _system_prompt: &str,
        _history: &[loom_orchestrator_core::domain::conversation::Message],
        _tools: &[ToolDescriptor],
    ) -> Result<GenerationResult, LLMError> {
        Err(LLMError::Authentication("invalid api key".to_string()))
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        Err(LLMError::Authentication("invalid api key".to_string()))
    }
}

#[tokio::test]
async fn provider_authentication_failure_bubbles_up_as_auth_required() {
    let config = base_config();
    let providers = Arc::new(ProviderRegistry::from_test_provider(
        "test",
        Arc::new(UnauthenticatedProvider),
    ));
    let mcp = Arc::new(McpComposite::start(vec![]).await.unwrap());
    let a2a = Arc::new(A2aGateway::new(vec![]));
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ConversationStore> = Arc::new(JsonFileConversationStore::open(dir.path()).await.unwrap());
    let orchestrator = Orchestrator::new(&config, store.clone(), providers, mcp, a2a);

    let conversation_id = Uuid::new_v4();
    let ctx = Context::new(None);
    let err = orchestrator
        .start(conversation_id, "abcd1234".to_string(), "hello".to_string(), ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::AuthRequired));

    // No conversation should have been persisted mid-run with a pending
    // approval: the failure aborts before any tool call is attempted.
    let lookup = store.get(conversation_id).await;
    if let Ok(conversation) = lookup {
        assert!(conversation.pending_approval.is_none());
        assert_ne!(conversation.status, ConversationStatus::WaitingApproval);
    }
}
