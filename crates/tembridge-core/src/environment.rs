// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The SDK workflow environment seam.
//!
//! The coordinator never talks to the Temporal server; every deterministic
//! primitive (activities, timers, children, versions, side effects) goes
//! through this trait, implemented over the SDK's workflow bindings. The
//! trait is synchronous by contract: the SDK calls into the coordinator on a
//! single thread per run, and completions arrive as callback invocations on
//! that same thread — possibly re-entrantly from inside a `request_cancel_*`
//! call, which is why the coordinator stages its own callbacks (see the
//! coordinator module).

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::converter::DataConverter;
use crate::error::Result;
use crate::types::{
    ActivityId, ActivityParams, ChildWorkflowParams, LocalActivityParams, LocalActivityResult,
    SearchAttributeUpdate, TimerId, WorkflowError, WorkflowExecution, WorkflowInfo,
};
use tembridge_protocol::proto::{Header, Payloads};

/// Result handler for an activity, timer, child workflow, side effect or
/// external signal/cancel. The SDK may invoke it synchronously from inside
/// the call that scheduled the primitive (replay) or from inside a cancel
/// request (cancel cascades).
pub type ResultHandler = Box<dyn FnOnce(std::result::Result<Option<Payloads>, WorkflowError>)>;

/// Result handler for a local activity attempt.
pub type LocalActivityResultHandler = Box<dyn FnOnce(LocalActivityResult)>;

/// Handler fired when a child workflow's start resolves, before its result.
pub type ExecutionStartedHandler =
    Box<dyn FnOnce(std::result::Result<WorkflowExecution, WorkflowError>)>;

/// Deferred update registration, invoked by the SDK's update loop.
pub type UpdateQueuedHandler = Box<dyn FnOnce()>;

/// Producer of a side-effect value, invoked at most once outside replay.
pub type SideEffectProducer = Box<dyn FnOnce() -> Option<Payloads>>;

/// Callbacks the SDK hands over for one workflow update.
///
/// `accept`/`reject` answer the validation stage; `complete` delivers the
/// execution result. Rejecting implies the update will never complete.
pub trait UpdateCallbacks {
    fn accept(&self);
    fn reject(&self, error: WorkflowError);
    fn complete(&self, result: Option<Payloads>, error: Option<WorkflowError>);
}

/// Deterministic workflow environment supplied by the SDK for one run.
pub trait WorkflowEnvironment {
    /// Current workflow identity and history counters.
    fn workflow_info(&self) -> WorkflowInfo;

    /// Deterministic workflow time.
    fn now(&self) -> DateTime<Utc>;

    /// True while history is being replayed.
    fn is_replaying(&self) -> bool;

    /// Data converter for values the bridge itself produces.
    fn data_converter(&self) -> &DataConverter;

    fn execute_activity(&self, params: ActivityParams, callback: ResultHandler) -> ActivityId;

    fn execute_local_activity(
        &self,
        params: LocalActivityParams,
        callback: LocalActivityResultHandler,
    ) -> ActivityId;

    fn execute_child_workflow(
        &self,
        params: ChildWorkflowParams,
        result_callback: ResultHandler,
        started_callback: ExecutionStartedHandler,
    );

    fn request_cancel_activity(&self, id: &ActivityId);

    fn request_cancel_local_activity(&self, id: &ActivityId);

    fn request_cancel_child_workflow(&self, namespace: &str, workflow_id: &str);

    /// Start a timer. Returns `None` when the delay is not in the future and
    /// the SDK fired the callback inline.
    fn new_timer(
        &self,
        delay: Duration,
        summary: Option<String>,
        callback: ResultHandler,
    ) -> Option<TimerId>;

    fn request_cancel_timer(&self, id: &TimerId);

    /// Deterministic version marker for the given change id.
    fn get_version(&self, change_id: &str, min_supported: i32, max_supported: i32) -> i32;

    /// Record a side-effect value. The producer runs only when the value is
    /// not already in history; the callback always fires with the recorded
    /// value.
    fn side_effect(&self, producer: SideEffectProducer, callback: ResultHandler);

    /// Finish the workflow. Exactly one of `result`/`error` is meaningful; a
    /// continue-as-new error starts a fresh run.
    fn complete(&self, result: Option<Payloads>, error: Option<WorkflowError>);

    fn upsert_search_attributes(&self, attributes: BTreeMap<String, Value>) -> Result<()>;

    fn upsert_typed_search_attributes(&self, updates: Vec<SearchAttributeUpdate>) -> Result<()>;

    fn upsert_memo(&self, memo: BTreeMap<String, Value>) -> Result<()>;

    #[allow(clippy::too_many_arguments)]
    fn signal_external_workflow(
        &self,
        namespace: &str,
        workflow_id: &str,
        run_id: &str,
        signal_name: &str,
        input: Option<Payloads>,
        header: Option<Header>,
        child_workflow_only: bool,
        callback: ResultHandler,
    );

    fn request_cancel_external_workflow(
        &self,
        namespace: &str,
        workflow_id: &str,
        run_id: &str,
        callback: ResultHandler,
    );

    /// Queue an update registration; the SDK invokes the handler from its
    /// update loop in history order.
    fn queue_update(&self, name: &str, handler: UpdateQueuedHandler);
}
