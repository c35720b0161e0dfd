// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # loom-orchestrator-core
//!
//! The runtime heart of the Loom agent orchestrator: a tree-structured
//! execution engine that drives an LLM through multiple turns of tool
//! selection, executes tool calls against MCP servers or delegates to peer
//! agents over A2A, and pauses for human/upstream approval before any
//! destructive operation runs.
//!
//! ## Components
//!
//! | Component | Domain/application files |
//! |---|---|
//! | **Orchestrator tree interpreter** | [`domain::node`], [`application::orchestrator`] |
//! | **Turn loop** | [`domain::llm`], [`application::turn_loop`] |
//! | **MCP composite client** | [`domain::mcp`], [`application::mcp_composite`], [`infrastructure::mcp`] |
//! | **A2A gateway** | [`domain::a2a`], [`application::a2a_gateway`], [`infrastructure::a2a`] |
//! | **Approval engine** | [`domain::approval`], [`application::approval_engine`] |
//! | **Conversation store** | [`domain::conversation`], [`domain::repository`], [`infrastructure::storage`] |
//!
//! ## Layer Structure
//!
//! ```text
//! presentation/   ← Axum REST facade, A2A JSON-RPC endpoint
//!     ↓
//! application/    ← Orchestrator, turn loop, MCP composite, A2A gateway, approval engine
//!     ↓
//! domain/         ← Node tree, conversation aggregate, tool descriptors, repository traits
//!     ↓
//! infrastructure/ ← LLM provider adapters, MCP transports, A2A client, JSON file store
//! ```
//!
//! ## Integration Tests
//!
//! See `orchestrator/core/tests/` for the pause/resume round trip and the
//! end-to-end orchestration scenarios.

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::OrchestratorError;
