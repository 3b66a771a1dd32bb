// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Correlation of child-workflow start results with later lookups.

use std::collections::HashMap;

use crate::types::{WorkflowError, WorkflowExecution};

/// Outcome of starting a child workflow.
pub type ExecutionResult = Result<WorkflowExecution, WorkflowError>;

/// Callback fired once the start result for an id is known.
pub type ExecutionHandler = Box<dyn FnOnce(ExecutionResult)>;

/// Single-shot rendezvous between a child workflow's start result and the
/// worker's request for its execution handle.
///
/// The SDK delivers the start result and the worker asks for it on
/// independent schedules, so either side may arrive first; whichever comes
/// second fires the callback immediately. Each id fires at most once.
#[derive(Default)]
pub struct IdRegistry {
    listeners: HashMap<u64, ExecutionHandler>,
    results: HashMap<u64, ExecutionResult>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start result for `id`, firing a waiting listener if any.
    pub fn push(&mut self, id: u64, result: ExecutionResult) {
        match self.listeners.remove(&id) {
            Some(listener) => listener(result),
            None => {
                self.results.insert(id, result);
            }
        }
    }

    /// Register a listener for `id`, firing immediately if the result is
    /// already known.
    pub fn listen(&mut self, id: u64, callback: ExecutionHandler) {
        match self.results.remove(&id) {
            Some(result) => callback(result),
            None => {
                self.listeners.insert(id, callback);
            }
        }
    }
}

impl std::fmt::Debug for IdRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdRegistry")
            .field("waiting_listeners", &self.listeners.len())
            .field("unclaimed_results", &self.results.len())
            .finish()
    }
}
