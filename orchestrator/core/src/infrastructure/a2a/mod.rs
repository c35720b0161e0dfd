// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! A2A outbound transport (§4.5, §6): a single HTTP JSON-RPC 2.0 client
//! implementing the domain's `A2aClient` trait, one instance per configured
//! peer, injected into `application::a2a_gateway::A2aGateway`.

pub mod http;

pub use http::HttpA2aClient;
