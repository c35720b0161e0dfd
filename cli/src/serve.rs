// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Wires one `AppConfig` into a running `presentation::api` server: builds
//! the MCP sub-clients, the provider registry, the A2A gateway and the
//! conversation store, then constructs the `Orchestrator` and the
//! `ApprovalEngine` on top of them.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use loom_orchestrator_core::application::a2a_gateway::A2aGateway;
use loom_orchestrator_core::application::approval_engine::ApprovalEngine;
use loom_orchestrator_core::application::mcp_composite::McpComposite;
use loom_orchestrator_core::application::orchestrator::Orchestrator;
use loom_orchestrator_core::domain::a2a::A2aClient;
use loom_orchestrator_core::domain::config::AppConfig;
use loom_orchestrator_core::domain::mcp::McpSubClient;
use loom_orchestrator_core::domain::repository::ConversationStore;
use loom_orchestrator_core::infrastructure::a2a::HttpA2aClient;
use loom_orchestrator_core::infrastructure::llm::registry::ProviderRegistry;
use loom_orchestrator_core::infrastructure::mcp::{HttpMcpClient, StdioMcpClient};
use loom_orchestrator_core::infrastructure::storage::JsonFileConversationStore;
use loom_orchestrator_core::presentation::api::{app, AppState};

/// Build the full `AppState` from a validated config. Separated from
/// `run` so tests can construct a state without binding a socket.
pub async fn build_state(config: AppConfig) -> Result<Arc<AppState>> {
    let mut sub_clients: Vec<Arc<dyn McpSubClient>> = Vec::new();
    for server in &config.mcp_servers {
        if let Some(url) = &server.url {
            sub_clients.push(Arc::new(HttpMcpClient::new(server.name.clone(), url.clone())));
        } else if let Some(command) = &server.command {
            let client = StdioMcpClient::spawn(server.name.clone(), command, &server.args)
                .await
                .with_context(|| format!("failed to spawn mcp server '{}'", server.name))?;
            sub_clients.push(Arc::new(client));
        }
    }

    let providers = Arc::new(
        ProviderRegistry::from_config(&config.llm.providers)
            .context("failed to build llm provider registry")?,
    );
    let mcp = Arc::new(
        McpComposite::start(sub_clients)
            .await
            .context("failed to start mcp composite")?,
    );

    let mut peers = Vec::with_capacity(config.a2a.len());
    for peer in &config.a2a {
        let client: Arc<dyn A2aClient> = Arc::new(HttpA2aClient::new(peer.url.clone()));
        peers.push((peer.clone(), client));
    }
    let a2a = Arc::new(A2aGateway::new(peers));

    let store: Arc<dyn ConversationStore> = Arc::new(
        JsonFileConversationStore::open(&config.data_dir)
            .await
            .context("failed to open conversation store")?,
    );

    let orchestrator = Arc::new(Orchestrator::new(
        &config,
        store.clone(),
        providers,
        mcp.clone(),
        a2a,
    ));
    let approval_engine = Arc::new(ApprovalEngine::new(orchestrator.clone()));

    Ok(Arc::new(AppState {
        config,
        orchestrator,
        approval_engine,
        mcp,
        store,
    }))
}

/// Build the state and serve the REST façade on `host:port` until the
/// process is signalled to stop.
pub async fn run(config: AppConfig, port_override: Option<u16>) -> Result<()> {
    let host = config.host.clone();
    let port = port_override.unwrap_or(config.port);

    let state = build_state(config).await?;
    let router = app(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, "loom orchestrator listening");
    axum::serve(listener, router)
        .await
        .context("server loop exited with an error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_orchestrator_core::domain::config::LlmConfig;

    fn minimal_config(data_dir: &std::path::Path) -> AppConfig {
        AppConfig {
            name: "resources".to_string(),
            description: String::new(),
            prompt: "You manage resources.".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: data_dir.to_string_lossy().to_string(),
            llm: LlmConfig {
                model: "anthropic:claude".to_string(),
                providers: vec![],
            },
            mcp_servers: vec![],
            a2a: vec![],
            agent: None,
        }
    }

    #[tokio::test]
    async fn builds_state_from_a_minimal_config_with_no_servers_or_peers() {
        let dir = tempfile::tempdir().unwrap();
        let state = build_state(minimal_config(dir.path())).await.unwrap();
        assert_eq!(state.config.name, "resources");
        assert!(state.mcp.tools().is_empty());
    }
}
