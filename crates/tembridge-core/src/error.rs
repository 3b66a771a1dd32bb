// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the bridge core.
//!
//! Everything here is fatal for the current workflow task: the SDK-side
//! dispatcher fails the task and the server retries it. Recoverable
//! conditions (unknown update ids, bad attribute values) are logged and
//! skipped instead of surfacing as errors.

use thiserror::Error;

use crate::converter::ConverterError;
use crate::pool::PoolError;
use crate::types::WorkflowError;
use tembridge_protocol::CodecError;

/// Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors raised by the coordinator and its satellites.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The worker answered with a response stream; streams are unsupported.
    #[error("streaming is not supported")]
    StreamingNotSupported,

    /// The pool returned without a reply ready. The pool contract promises
    /// the reply is resolved by the time `exec` returns its receiver.
    #[error("worker empty response")]
    WorkerEmptyResponse,

    /// A single-command exchange decoded into zero or multiple messages.
    #[error("unexpected pool response")]
    UnexpectedPoolResponse,

    /// A known command arrived from the wrong side of the protocol.
    #[error("undefined command: {0}")]
    UndefinedCommand(&'static str),

    /// An update message arrived without an update id.
    #[error("update id is empty, can't {stage} update")]
    EmptyUpdateId { stage: &'static str },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("data converter error: {0}")]
    Converter(#[from] ConverterError),

    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    /// SDK environment rejected an upsert or similar direct call.
    #[error("environment error: {0}")]
    Environment(String),

    /// One or more cancel thunks failed.
    #[error("cancel failed: {0}")]
    Cancel(String),

    /// A typed search attribute carried an unparsable datetime; the whole
    /// batch is discarded.
    #[error("failed to parse time into RFC3339: {0}")]
    SearchAttributeTime(#[from] chrono::ParseError),

    /// The external worker declared the same workflow more than once.
    #[error("duplicate workflow name: {0}")]
    DuplicateWorkflow(String),

    /// Failure propagated from the worker or a user handler, carried without
    /// wrapping so Temporal's failure classification is preserved.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_messages() {
        assert_eq!(
            BridgeError::StreamingNotSupported.to_string(),
            "streaming is not supported"
        );
        assert_eq!(
            BridgeError::WorkerEmptyResponse.to_string(),
            "worker empty response"
        );
        assert_eq!(
            BridgeError::EmptyUpdateId { stage: "complete" }.to_string(),
            "update id is empty, can't complete update"
        );
    }

    #[test]
    fn test_workflow_failure_is_transparent() {
        let err: BridgeError = WorkflowError::application("user panic", true).into();
        assert_eq!(err.to_string(), "user panic");
    }
}
