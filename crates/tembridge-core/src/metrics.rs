// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Metrics hooks. The bridge only owns two gauge update points; the sink
//! behind them is supplied (or omitted) by the surrounding plugin.

/// Gauge tracking the workflow pool queue size, updated around each flush.
pub const WORKFLOWS_POOL_QUEUE_SIZE: &str = "rr_workflows_pool_queue_size";

/// Gauge tracking the pool queue size around single-command exchanges.
pub const POOL_QUEUE_SIZE: &str = "rr_pool_queue_size";

/// Minimal gauge sink.
pub trait MetricsSink {
    fn update_gauge(&self, name: &str, value: f64);
}
