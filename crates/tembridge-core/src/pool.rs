// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Contract of the worker pool that executes transport payloads.
//!
//! Pool lifecycle (spawning worker processes, supervision, restarts) lives
//! outside this crate; the coordinator only needs a way to ship one payload
//! and read back one reply.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use tembridge_protocol::Payload;

/// Errors surfaced by a pool executor.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker execution failed: {0}")]
    Exec(String),

    #[error("worker pool stopped")]
    Stopped,
}

/// Outcome of one payload execution.
pub type PoolReply = std::result::Result<Payload, PoolError>;

/// Executes one payload against an external worker.
///
/// The returned receiver MUST already hold the reply when `exec` returns:
/// workflow-task exchanges are synchronous round trips and the coordinator
/// performs a non-blocking receive. A receiver that is still empty is
/// reported as a protocol violation (`worker empty response`), not waited
/// on.
///
/// `stop` is signalled when the reply announced a stream; the pool should
/// tear the stream down. Streams are never consumed by the bridge.
pub trait PoolExecutor {
    fn exec(
        &self,
        payload: &Payload,
        stop: mpsc::Receiver<()>,
    ) -> std::result::Result<oneshot::Receiver<PoolReply>, PoolError>;

    /// Number of payloads currently queued in the pool, for gauge updates.
    fn queue_size(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_error_display() {
        assert_eq!(
            PoolError::Exec("worker died".into()).to_string(),
            "worker execution failed: worker died"
        );
        assert_eq!(PoolError::Stopped.to_string(), "worker pool stopped");
    }
}
