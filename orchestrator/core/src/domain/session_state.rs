// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Per-run key/value map shared across an agent tree's nodes, and the
//! `{key}` placeholder substitution used to thread one node's output into
//! another's prompt.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Key/value store for one orchestration run. Wrapped in
/// `Arc<parking_lot::RwLock<_>>` by callers that need concurrent access
/// across `parallel` children; the type itself carries no locking.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    values: HashMap<String, String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Replace every `{key}` substring in `template` with `session_state[key]`,
    /// or the empty string if the key is absent. Single-pass: substituted
    /// text is not itself re-scanned for further placeholders.
    pub fn resolve_placeholders(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let bytes = template.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'{' {
                if let Some(end) = template[i + 1..].find('}') {
                    let key = &template[i + 1..i + 1 + end];
                    out.push_str(self.get(key).unwrap_or(""));
                    i = i + 1 + end + 1;
                    continue;
                }
            }
            let ch = template[i..].chars().next().unwrap();
            out.push(ch);
            i += ch.len_utf8();
        }
        out
    }
}
