// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Loom orchestrator CLI - exposes testable components.

pub mod serve;
