// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Conversation persistence (§6 Persistence layout): one JSON file per
//! conversation under a configured data directory, written atomically.

mod json_file;

pub use json_file::JsonFileConversationStore;
