// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tool descriptors: the typed surface offered to the LLM at each `llm` node.
//!
//! Covers MCP tools, synthetic `a2a_<peer>` tools, and the synthetic
//! `exit_loop` tool — all share one shape so the turn loop (`application::turn_loop`)
//! never has to special-case origin when building the tool list for a call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the synthetic tool a `loop` child calls to terminate the loop.
pub const EXIT_LOOP_TOOL: &str = "exit_loop";

/// A single tool offered to the LLM: a name, a JSON-Schema-like input shape,
/// a destructive flag, and the server it originated from (empty for synthetic
/// tools such as `exit_loop` or `a2a_<peer>`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
    pub destructive: bool,
    /// Source tag: the MCP server name, or empty for synthetic tools.
    #[serde(default)]
    pub server: String,
}

impl ToolDescriptor {
    pub fn synthetic_exit_loop() -> Self {
        Self {
            name: EXIT_LOOP_TOOL.to_string(),
            description: "Terminate the enclosing loop node cleanly.".to_string(),
            input_schema: ToolInputSchema::empty_object(),
            destructive: false,
            server: String::new(),
        }
    }

    pub fn synthetic_a2a_peer(peer_name: &str, description: &str, destructive: bool) -> Self {
        Self {
            name: format!("a2a_{peer_name}"),
            description: description.to_string(),
            input_schema: ToolInputSchema::message_object(),
            destructive,
            server: String::new(),
        }
    }
}

/// A JSON-Schema-like description of a tool's arguments. Deliberately a
/// narrow subset (type/properties/required) — enough for the argument
/// coercion pass in `application::llm_gateway` to know which fields are
/// string-typed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: std::collections::HashMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ToolInputSchema {
    pub fn empty_object() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: std::collections::HashMap::new(),
            required: Vec::new(),
        }
    }

    pub fn message_object() -> Self {
        let mut properties = std::collections::HashMap::new();
        properties.insert(
            "message".to_string(),
            PropertySchema {
                property_type: "string".to_string(),
            },
        );
        Self {
            schema_type: "object".to_string(),
            properties,
            required: vec!["message".to_string()],
        }
    }

    /// The schema-declared type of a named property, if any.
    pub fn property_type(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(|p| p.property_type.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub property_type: String,
}

/// A single tool call decoded from an LLM response, before argument coercion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_loop_tool_is_non_destructive() {
        let tool = ToolDescriptor::synthetic_exit_loop();
        assert_eq!(tool.name, EXIT_LOOP_TOOL);
        assert!(!tool.destructive);
        assert!(tool.server.is_empty());
    }

    #[test]
    fn a2a_peer_tool_carries_declared_flag() {
        let tool = ToolDescriptor::synthetic_a2a_peer("billing", "delegates to billing agent", true);
        assert_eq!(tool.name, "a2a_billing");
        assert!(tool.destructive);
    }

    #[test]
    fn property_type_lookup() {
        let schema = ToolInputSchema::message_object();
        assert_eq!(schema.property_type("message"), Some("string"));
        assert_eq!(schema.property_type("missing"), None);
    }
}
