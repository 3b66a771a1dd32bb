// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-run workflow coordination between the Temporal SDK and external
//! worker processes.
//!
//! The Temporal SDK drives deterministic replay and schedules activities,
//! timers, child workflows, signals, queries and updates. The user's actual
//! workflow code lives in an out-of-process worker that speaks the
//! `tembridge-protocol` wire format. This crate sits between the two: a
//! [`Coordinator`] per workflow run intercepts the SDK's callbacks, batches
//! them into protocol commands, round-trips them through a worker pool, and
//! maps the worker's commands back onto SDK primitives without breaking the
//! determinism contract.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ Temporal SDK (replay, timers, activities, history)        │
//! ├──────────────────── WorkflowEnvironment ──────────────────┤
//! │ Coordinator: message queue, canceller, id registry,       │
//! │              deferred callbacks, flush protocol           │
//! ├──────────────────── PoolExecutor ─────────────────────────┤
//! │ Worker pool: external processes running user workflows    │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Both seams are traits: [`environment::WorkflowEnvironment`] wraps the
//! SDK's workflow bindings, [`pool::PoolExecutor`] wraps the process pool.
//! Everything between them is deterministic, single-threaded per run, and
//! owned by this crate.

pub mod canceller;
pub mod config;
pub mod converter;
pub mod coordinator;
pub mod environment;
pub mod error;
pub mod ids;
pub mod metrics;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod types;

pub use canceller::Canceller;
pub use config::{BridgeConfig, PoolConfig};
pub use converter::{DataConverter, FailureConverter};
pub use coordinator::Coordinator;
pub use environment::{UpdateCallbacks, WorkflowEnvironment};
pub use error::{BridgeError, Result};
pub use ids::IdRegistry;
pub use pool::{PoolError, PoolExecutor, PoolReply};
pub use queue::MessageQueue;
pub use registry::{fetch_worker_info, WorkerInfo, WorkerRegistry};
