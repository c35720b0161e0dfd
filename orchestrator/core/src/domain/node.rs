// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! The agent orchestration tree: a closed set of node variants (§4.3),
//! modeled as a tagged sum the way the teacher's `workflow::StateKind`
//! models its own closed variant set, so YAML config deserializes straight
//! into the tree the interpreter walks.

use serde::{Deserialize, Serialize};

/// Default cap on `loop` iterations when `max_iterations` is unset.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// One node of the agent orchestration tree. A closed variant set; the
/// interpreter (`application::orchestrator`) matches on this exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Sequential(SequentialNode),
    Parallel(ParallelNode),
    Loop(LoopNode),
    Llm(LlmNode),
    A2a(A2aNode),
}

impl Node {
    /// True for composite node types that route pause decisions (§4.3).
    pub fn is_sequential(&self) -> bool {
        matches!(self, Node::Sequential(_))
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Node::Sequential(_) | Node::Parallel(_) | Node::Loop(_))
    }

    pub fn output_key(&self) -> Option<&str> {
        match self {
            Node::Sequential(n) => n.output_key.as_deref(),
            Node::Parallel(n) => n.output_key.as_deref(),
            Node::Loop(n) => n.output_key.as_deref(),
            Node::Llm(n) => n.output_key.as_deref(),
            Node::A2a(n) => n.output_key.as_deref(),
        }
    }

    /// Children in declaration order, for composite node types only.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Sequential(n) => &n.children,
            Node::Parallel(n) => &n.children,
            Node::Loop(n) => &n.children,
            Node::Llm(_) | Node::A2a(_) => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequentialNode {
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelNode {
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopNode {
    pub children: Vec<Node>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

/// A leaf that drives the LLM↔tool-call turn loop (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmNode {
    /// `provider:name` model identifier.
    pub model: String,
    /// Prompt template; `{key}` placeholders resolved against session state.
    pub prompt: String,
    /// Names of A2A peers this node may delegate to as synthetic tools.
    #[serde(default)]
    pub a2a_peers: Vec<String>,
    /// Whether this node may call the synthetic `exit_loop` tool.
    #[serde(default)]
    pub can_exit_loop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
}

/// A leaf that delegates to a single remote A2A peer directly (outside the
/// turn loop's `a2a_<peer>` synthetic-tool path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2aNode {
    pub peer: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_node_defaults_max_iterations() {
        let yaml = "kind: loop\nchildren: []\n";
        let node: Node = serde_yaml::from_str(yaml).unwrap();
        match node {
            Node::Loop(n) => assert_eq!(n.max_iterations, DEFAULT_MAX_ITERATIONS),
            _ => panic!("expected loop node"),
        }
    }

    #[test]
    fn sequential_ancestor_detection() {
        let seq = Node::Sequential(SequentialNode {
            children: vec![],
            output_key: None,
        });
        assert!(seq.is_sequential());
        assert!(seq.is_composite());

        let llm = Node::Llm(LlmNode {
            model: "provider:name".to_string(),
            prompt: "hi".to_string(),
            a2a_peers: vec![],
            can_exit_loop: false,
            output_key: None,
        });
        assert!(!llm.is_composite());
    }

    #[test]
    fn tagged_enum_round_trips_through_yaml() {
        let yaml = "kind: llm\nmodel: provider:name\nprompt: hello {x}\n";
        let node: Node = serde_yaml::from_str(yaml).unwrap();
        match node {
            Node::Llm(n) => assert_eq!(n.prompt, "hello {x}"),
            _ => panic!("expected llm node"),
        }
    }
}
