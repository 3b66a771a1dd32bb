// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-tick context header shipped with every batch.

use serde::{Deserialize, Serialize};

/// Snapshot of the workflow environment taken once per tick and sent as the
/// header of each batch. All values come from the SDK; the bridge never reads
/// clocks or history on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    /// Task queue the workflow worker polls.
    pub task_queue: String,
    /// Deterministic workflow time, RFC3339.
    pub tick_time: String,
    /// True while the SDK replays history.
    pub replay: bool,
    /// Current history length in events.
    pub history_len: i64,
    /// Current history size in bytes.
    pub history_size: i64,
    /// Server hint that the workflow should continue-as-new soon.
    pub continue_as_new_suggested: bool,
    /// Bridge-side identity of the workflow pool.
    #[serde(rename = "rrID")]
    pub rr_id: String,
    /// OS process id of the external worker.
    #[serde(rename = "workerPID")]
    pub worker_pid: i32,
}
