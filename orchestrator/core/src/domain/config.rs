// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Top-level agent configuration (§6, §6.4): the YAML shape an operator
//! writes to stand up one orchestrator instance — its LLM model, its MCP
//! servers, its A2A peers, and (optionally) the agent tree it runs.
//!
//! Loading (reading the file, honoring `ORCHESTRATOR_CONFIG_PATH`) is
//! infrastructure concern and lives in `infrastructure::config_loader`; this
//! module only owns the shape and the validation pass.

use serde::{Deserialize, Serialize};

use crate::domain::a2a::A2aPeerConfig;
use crate::domain::mcp::McpServerConfig;
use crate::domain::node::Node;

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> String {
    "./data".to_string()
}

/// One configured agent instance (§6 Configuration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    pub llm: LlmConfig,
    #[serde(default)]
    pub mcp_servers: Vec<McpServerConfig>,
    #[serde(default)]
    pub a2a: Vec<A2aPeerConfig>,
    /// Root of the agent orchestration tree. A config with no tree runs in
    /// "simple mode": a single implicit `llm` node using `prompt`/`llm.model`
    /// with every configured MCP tool and A2A peer available.
    #[serde(default)]
    pub agent: Option<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// `provider:name` model identifier resolved by the `ProviderRegistry`.
    pub model: String,
    /// Backing providers the registry constructs adapters from.
    #[serde(default)]
    pub providers: Vec<ProviderEntryConfig>,
}

/// One entry in `llm.providers`: enough to construct a single provider
/// adapter (`infrastructure::llm::registry::ProviderRegistry`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntryConfig {
    /// The key addressed by the `provider` half of a `provider:name` model id.
    pub name: String,
    pub kind: ProviderKind,
    pub model: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Literal key, or `env:VAR_NAME` indirection.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    Openai,
    Ollama,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("mcp_servers[{0}].name must not be empty")]
    EmptyMcpServerName(usize),

    #[error("duplicate mcp_servers name: '{0}'")]
    DuplicateMcpServerName(String),

    #[error("a2a[{0}].name must not be empty")]
    EmptyA2aPeerName(usize),

    #[error("duplicate a2a peer name: '{0}'")]
    DuplicateA2aPeerName(String),

    #[error("agent tree references undeclared a2a peer '{0}'")]
    UndeclaredA2aPeer(String),

    #[error("port must be non-zero")]
    ZeroPort,
}

impl AppConfig {
    /// Validate cross-field invariants not expressible in the schema itself
    /// (§6.4): non-empty/unique mcp_servers and a2a names, a non-zero port,
    /// and that the agent tree only references declared A2A peers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }

        let mut seen_mcp = std::collections::HashSet::new();
        for (i, server) in self.mcp_servers.iter().enumerate() {
            if server.name.is_empty() {
                return Err(ConfigError::EmptyMcpServerName(i));
            }
            if !seen_mcp.insert(server.name.as_str()) {
                return Err(ConfigError::DuplicateMcpServerName(server.name.clone()));
            }
        }

        let mut seen_a2a = std::collections::HashSet::new();
        for (i, peer) in self.a2a.iter().enumerate() {
            if peer.name.is_empty() {
                return Err(ConfigError::EmptyA2aPeerName(i));
            }
            if !seen_a2a.insert(peer.name.as_str()) {
                return Err(ConfigError::DuplicateA2aPeerName(peer.name.clone()));
            }
        }

        if let Some(agent) = &self.agent {
            check_a2a_references(agent, &seen_a2a)?;
        }

        Ok(())
    }
}

fn check_a2a_references(
    node: &Node,
    declared: &std::collections::HashSet<&str>,
) -> Result<(), ConfigError> {
    if let Node::Llm(llm) = node {
        for peer in &llm.a2a_peers {
            if !declared.contains(peer.as_str()) {
                return Err(ConfigError::UndeclaredA2aPeer(peer.clone()));
            }
        }
    }
    if let Node::A2a(a2a) = node {
        if !declared.contains(a2a.peer.as_str()) {
            return Err(ConfigError::UndeclaredA2aPeer(a2a.peer.clone()));
        }
    }
    for child in node.children() {
        check_a2a_references(child, declared)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            name: "resource-agent".to_string(),
            description: String::new(),
            prompt: "You manage resources.".to_string(),
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            llm: LlmConfig {
                model: "anthropic:claude".to_string(),
                providers: vec![],
            },
            mcp_servers: vec![],
            a2a: vec![],
            agent: None,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_zero_port() {
        let mut c = base_config();
        c.port = 0;
        assert_eq!(c.validate(), Err(ConfigError::ZeroPort));
    }

    #[test]
    fn rejects_duplicate_mcp_server_names() {
        let mut c = base_config();
        c.mcp_servers = vec![
            McpServerConfig {
                name: "resources".to_string(),
                url: Some("http://localhost:9000".to_string()),
                command: None,
                args: vec![],
            },
            McpServerConfig {
                name: "resources".to_string(),
                url: Some("http://localhost:9001".to_string()),
                command: None,
                args: vec![],
            },
        ];
        assert_eq!(
            c.validate(),
            Err(ConfigError::DuplicateMcpServerName("resources".to_string()))
        );
    }

    #[test]
    fn rejects_agent_tree_referencing_undeclared_peer() {
        use crate::domain::node::{LlmNode, Node};
        let mut c = base_config();
        c.agent = Some(Node::Llm(LlmNode {
            model: "anthropic:claude".to_string(),
            prompt: "hi".to_string(),
            a2a_peers: vec!["billing".to_string()],
            can_exit_loop: false,
            output_key: None,
        }));
        assert_eq!(
            c.validate(),
            Err(ConfigError::UndeclaredA2aPeer("billing".to_string()))
        );
    }

    #[test]
    fn accepts_agent_tree_referencing_declared_peer() {
        use crate::domain::node::{LlmNode, Node};
        let mut c = base_config();
        c.a2a = vec![A2aPeerConfig {
            name: "billing".to_string(),
            url: "http://localhost:9100".to_string(),
            description: "billing agent".to_string(),
            destructive_hint: true,
        }];
        c.agent = Some(Node::Llm(LlmNode {
            model: "anthropic:claude".to_string(),
            prompt: "hi".to_string(),
            a2a_peers: vec!["billing".to_string()],
            can_exit_loop: false,
            output_key: None,
        }));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn deserializes_minimal_yaml() {
        let yaml = "name: resources\nllm:\n  model: anthropic:claude\n";
        let c: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(c.port, 8080);
        assert_eq!(c.host, "127.0.0.1");
    }
}
