// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pause snapshot for a suspended orchestration run.
//!
//! Deliberately a plain value, not a captured continuation (§9): resume
//! re-walks the tree from the root using `paused_node_path` rather than
//! restoring an in-memory call stack.

use serde::{Deserialize, Serialize};

use crate::domain::session_state::SessionState;

/// The minimal suspension token needed to resume an orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// Child indices from root to the paused leaf. Empty = root is the leaf.
    pub paused_node_path: Vec<usize>,
    /// Output key the paused node will write its result under, once resumed.
    pub paused_node_output_key: String,
    /// Snapshot of session state at the moment of pause.
    pub session_state: SessionState,
    /// The original top-level user input that started this run.
    pub user_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_addresses_root() {
        let p = PipelineState {
            paused_node_path: vec![],
            paused_node_output_key: String::new(),
            session_state: SessionState::new(),
            user_message: "hi".to_string(),
        };
        assert!(p.paused_node_path.is_empty());
    }
}
