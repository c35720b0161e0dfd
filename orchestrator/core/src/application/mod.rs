// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application services: the orchestrator tree interpreter, the LLM↔tool
//! turn loop, the MCP composite client, the A2A gateway, and the approval
//! engine.
//!
//! Domain modules define the shapes (`Node`, `Conversation`, `ToolDescriptor`,
//! ...); these modules wire them into running behavior over injected
//! infrastructure collaborators (`LLMProvider`, `McpSubClient`, `A2aClient`,
//! `ConversationStore`), the same layering the teacher's
//! `application::workflow_engine` uses over its own repository/runtime traits.

pub mod a2a_gateway;
pub mod approval_engine;
pub mod mcp_composite;
pub mod orchestrator;
pub mod turn_loop;
