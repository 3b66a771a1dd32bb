// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared mocks for coordinator integration tests: a scriptable worker pool
//! and a recording SDK environment.

#![allow(dead_code)] // Not every test file uses every helper.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use tembridge_core::converter::DataConverter;
use tembridge_core::environment::{
    ExecutionStartedHandler, LocalActivityResultHandler, ResultHandler, SideEffectProducer,
    UpdateCallbacks, UpdateQueuedHandler, WorkflowEnvironment,
};
use tembridge_core::metrics::MetricsSink;
use tembridge_core::pool::{PoolError, PoolExecutor, PoolReply};
use tembridge_core::types::{
    ActivityId, ActivityParams, ChildWorkflowParams, LocalActivityParams, LocalActivityResult,
    SearchAttributeUpdate, TimerId, WorkflowError, WorkflowExecution, WorkflowInfo,
};
use tembridge_core::Coordinator;
use tembridge_protocol::proto::{Failure, Header, Payloads};
use tembridge_protocol::{Codec, Command, Context, Message, Payload, PayloadPool, STREAM};

static INIT_LOGGING: Once = Once::new();

/// Install a test subscriber once so `RUST_LOG=debug` shows bridge logs.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Encode a value the way the default converter does.
pub fn json_payloads<T: Serialize>(value: &T) -> Payloads {
    DataConverter.to_payloads(value).unwrap()
}

/// Decode the single payload of a message with the default converter.
pub fn decode_payload<T: serde::de::DeserializeOwned>(payloads: &Option<Payloads>) -> T {
    let payloads = payloads.as_ref().expect("message has no payloads");
    DataConverter.from_payload(&payloads.payloads[0]).unwrap()
}

/// Build a worker command message.
pub fn command_message(id: u64, command: Command, payloads: Option<Payloads>) -> Message {
    Message {
        id,
        command: Some(command),
        payloads,
        ..Default::default()
    }
}

/// Build a worker command message carrying a failure.
pub fn failed_command_message(id: u64, command: Command, message: &str) -> Message {
    Message {
        id,
        command: Some(command),
        failure: Some(Failure {
            message: message.to_string(),
            source: "php".to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

// ============================================================================
// Scriptable worker pool
// ============================================================================

/// What the pool should answer to the next `exec` call.
pub enum ScriptedReply {
    /// A normal frame carrying these messages.
    Messages(Vec<Message>),
    /// A reply with the stream flag set.
    Stream,
    /// No reply ready when `exec` returns (contract violation).
    Empty,
    /// Worker-level execution error.
    Error(String),
}

/// Pool executor that decodes every request for assertions and answers from
/// a script. Unscripted calls answer with an empty frame.
pub struct MockPool {
    codec: Codec,
    replies: RefCell<VecDeque<ScriptedReply>>,
    /// Decoded (context, messages) of every exec call, in order.
    pub requests: RefCell<Vec<(Context, Vec<Message>)>>,
    stop_receivers: RefCell<Vec<mpsc::Receiver<()>>>,
    pub queue: Cell<u64>,
}

impl MockPool {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            codec: Codec,
            replies: RefCell::new(VecDeque::new()),
            requests: RefCell::new(Vec::new()),
            stop_receivers: RefCell::new(Vec::new()),
            queue: Cell::new(0),
        })
    }

    pub fn script(&self, reply: ScriptedReply) {
        self.replies.borrow_mut().push_back(reply);
    }

    /// Messages of the nth exec call.
    pub fn request_messages(&self, index: usize) -> Vec<Message> {
        self.requests.borrow()[index].1.clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    /// How many stop signals the nth exec call received.
    pub fn stop_signals(&self, index: usize) -> usize {
        let mut count = 0;
        while self.stop_receivers.borrow_mut()[index].try_recv().is_ok() {
            count += 1;
        }
        count
    }
}

impl PoolExecutor for MockPool {
    fn exec(
        &self,
        payload: &Payload,
        stop: mpsc::Receiver<()>,
    ) -> Result<oneshot::Receiver<PoolReply>, PoolError> {
        let context = self
            .codec
            .decode_context(payload)
            .map_err(|err| PoolError::Exec(err.to_string()))?;
        let messages = self
            .codec
            .decode(payload)
            .map_err(|err| PoolError::Exec(err.to_string()))?;
        self.requests.borrow_mut().push((context, messages));
        self.stop_receivers.borrow_mut().push(stop);

        let (sender, receiver) = oneshot::channel();
        let scripted = self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or(ScriptedReply::Messages(Vec::new()));
        match scripted {
            ScriptedReply::Messages(messages) => {
                let mut reply = Payload::default();
                self.codec
                    .encode(&Context::default(), &mut reply, &messages)
                    .unwrap();
                let _ = sender.send(Ok(reply));
            }
            ScriptedReply::Stream => {
                let reply = Payload {
                    flags: STREAM,
                    ..Default::default()
                };
                let _ = sender.send(Ok(reply));
            }
            ScriptedReply::Empty => {
                // Drop the sender; the receiver never resolves.
            }
            ScriptedReply::Error(message) => {
                let _ = sender.send(Err(PoolError::Exec(message)));
            }
        }
        Ok(receiver)
    }

    fn queue_size(&self) -> u64 {
        self.queue.get()
    }
}

// ============================================================================
// Recording SDK environment
// ============================================================================

/// SDK environment double. Records every call, stores result handlers so
/// tests can fire completions, and mirrors the SDK's synchronous cancel
/// behavior: `request_cancel_*` fires the primitive's result handler with a
/// cancellation failure before returning.
pub struct MockEnvironment {
    pub info: RefCell<WorkflowInfo>,
    pub replaying: Cell<bool>,
    now: DateTime<Utc>,
    converter: DataConverter,

    next_id: Cell<u64>,
    /// When set, child workflow starts resolve immediately with a generated
    /// run id, as the SDK does on replay fast paths.
    pub auto_start_children: Cell<bool>,

    activity_handlers: RefCell<HashMap<String, ResultHandler>>,
    local_activity_handlers: RefCell<HashMap<String, LocalActivityResultHandler>>,
    timer_handlers: RefCell<HashMap<String, ResultHandler>>,
    child_result_handlers: RefCell<HashMap<String, ResultHandler>>,
    child_start_handlers: RefCell<HashMap<String, ExecutionStartedHandler>>,
    external_handlers: RefCell<Vec<ResultHandler>>,

    pub activities: RefCell<Vec<ActivityParams>>,
    pub local_activities: RefCell<Vec<LocalActivityParams>>,
    pub child_workflows: RefCell<Vec<ChildWorkflowParams>>,
    pub timers: RefCell<Vec<(Duration, Option<String>)>>,
    pub versions: RefCell<HashMap<String, i32>>,
    pub completion: RefCell<Option<(Option<Payloads>, Option<WorkflowError>)>>,
    pub search_attribute_upserts: RefCell<Vec<BTreeMap<String, Value>>>,
    pub typed_search_attribute_upserts: RefCell<Vec<Vec<SearchAttributeUpdate>>>,
    pub memo_upserts: RefCell<Vec<BTreeMap<String, Value>>>,
    pub external_signals: RefCell<Vec<(String, String, String)>>,
    pub external_cancels: RefCell<Vec<(String, String, String)>>,
    pub cancelled_activities: RefCell<Vec<String>>,
    pub cancelled_timers: RefCell<Vec<String>>,
    pub cancelled_children: RefCell<Vec<(String, String)>>,
    pub queued_updates: RefCell<Vec<String>>,
}

impl MockEnvironment {
    pub fn new(run_id: &str) -> Rc<Self> {
        Rc::new(Self {
            info: RefCell::new(WorkflowInfo {
                namespace: "default".to_string(),
                task_queue: "workflows".to_string(),
                workflow_type: "order".to_string(),
                workflow_id: "order-1".to_string(),
                run_id: run_id.to_string(),
                attempt: 1,
                history_length: 10,
                history_size: 2048,
                continue_as_new_suggested: false,
            }),
            replaying: Cell::new(false),
            now: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            converter: DataConverter,
            next_id: Cell::new(0),
            auto_start_children: Cell::new(false),
            activity_handlers: RefCell::new(HashMap::new()),
            local_activity_handlers: RefCell::new(HashMap::new()),
            timer_handlers: RefCell::new(HashMap::new()),
            child_result_handlers: RefCell::new(HashMap::new()),
            child_start_handlers: RefCell::new(HashMap::new()),
            external_handlers: RefCell::new(Vec::new()),
            activities: RefCell::new(Vec::new()),
            local_activities: RefCell::new(Vec::new()),
            child_workflows: RefCell::new(Vec::new()),
            timers: RefCell::new(Vec::new()),
            versions: RefCell::new(HashMap::new()),
            completion: RefCell::new(None),
            search_attribute_upserts: RefCell::new(Vec::new()),
            typed_search_attribute_upserts: RefCell::new(Vec::new()),
            memo_upserts: RefCell::new(Vec::new()),
            external_signals: RefCell::new(Vec::new()),
            external_cancels: RefCell::new(Vec::new()),
            cancelled_activities: RefCell::new(Vec::new()),
            cancelled_timers: RefCell::new(Vec::new()),
            cancelled_children: RefCell::new(Vec::new()),
            queued_updates: RefCell::new(Vec::new()),
        })
    }

    fn generate_id(&self, prefix: &str) -> String {
        let next = self.next_id.get() + 1;
        self.next_id.set(next);
        format!("{prefix}-{next}")
    }

    /// Fire the completion of an outstanding activity.
    pub fn complete_activity(
        &self,
        id: &ActivityId,
        result: Result<Option<Payloads>, WorkflowError>,
    ) {
        let handler = self
            .activity_handlers
            .borrow_mut()
            .remove(&id.0)
            .expect("no such activity");
        handler(result);
    }

    /// Fire the completion of an outstanding local activity.
    pub fn complete_local_activity(&self, id: &ActivityId, result: LocalActivityResult) {
        let handler = self
            .local_activity_handlers
            .borrow_mut()
            .remove(&id.0)
            .expect("no such local activity");
        handler(result);
    }

    /// Resolve a child workflow start with an execution handle.
    pub fn start_child(&self, workflow_id: &str, run_id: &str) {
        let handler = self
            .child_start_handlers
            .borrow_mut()
            .remove(workflow_id)
            .expect("no such child workflow");
        handler(Ok(WorkflowExecution {
            workflow_id: workflow_id.to_string(),
            run_id: run_id.to_string(),
        }));
    }

    /// Fire the completion of an outstanding timer.
    pub fn fire_timer(&self, id: &TimerId) {
        let handler = self
            .timer_handlers
            .borrow_mut()
            .remove(&id.0)
            .expect("no such timer");
        handler(Ok(None));
    }

    /// Resolve the oldest outstanding external signal/cancel request.
    pub fn resolve_external(&self, result: Result<Option<Payloads>, WorkflowError>) {
        let handler = self.external_handlers.borrow_mut().remove(0);
        handler(result);
    }
}

impl WorkflowEnvironment for MockEnvironment {
    fn workflow_info(&self) -> WorkflowInfo {
        self.info.borrow().clone()
    }

    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn is_replaying(&self) -> bool {
        self.replaying.get()
    }

    fn data_converter(&self) -> &DataConverter {
        &self.converter
    }

    fn execute_activity(&self, params: ActivityParams, callback: ResultHandler) -> ActivityId {
        let id = self.generate_id("activity");
        self.activities.borrow_mut().push(params);
        self.activity_handlers.borrow_mut().insert(id.clone(), callback);
        ActivityId(id)
    }

    fn execute_local_activity(
        &self,
        params: LocalActivityParams,
        callback: LocalActivityResultHandler,
    ) -> ActivityId {
        let id = self.generate_id("local-activity");
        self.local_activities.borrow_mut().push(params);
        self.local_activity_handlers
            .borrow_mut()
            .insert(id.clone(), callback);
        ActivityId(id)
    }

    fn execute_child_workflow(
        &self,
        params: ChildWorkflowParams,
        result_callback: ResultHandler,
        started_callback: ExecutionStartedHandler,
    ) {
        let workflow_id = params.workflow_id.clone();
        self.child_workflows.borrow_mut().push(params);
        self.child_result_handlers
            .borrow_mut()
            .insert(workflow_id.clone(), result_callback);
        if self.auto_start_children.get() {
            let run_id = self.generate_id("child-run");
            started_callback(Ok(WorkflowExecution {
                workflow_id,
                run_id,
            }));
        } else {
            self.child_start_handlers
                .borrow_mut()
                .insert(workflow_id, started_callback);
        }
    }

    fn request_cancel_activity(&self, id: &ActivityId) {
        self.cancelled_activities.borrow_mut().push(id.0.clone());
        if let Some(handler) = self.activity_handlers.borrow_mut().remove(&id.0) {
            handler(Err(WorkflowError::canceled("activity canceled")));
        }
    }

    fn request_cancel_local_activity(&self, id: &ActivityId) {
        self.cancelled_activities.borrow_mut().push(id.0.clone());
        if let Some(handler) = self.local_activity_handlers.borrow_mut().remove(&id.0) {
            handler(LocalActivityResult {
                result: None,
                error: Some(WorkflowError::canceled("local activity canceled")),
                attempt: 1,
                backoff_ms: 0,
            });
        }
    }

    fn request_cancel_child_workflow(&self, namespace: &str, workflow_id: &str) {
        self.cancelled_children
            .borrow_mut()
            .push((namespace.to_string(), workflow_id.to_string()));
        if let Some(handler) = self.child_result_handlers.borrow_mut().remove(workflow_id) {
            handler(Err(WorkflowError::canceled("child workflow canceled")));
        }
    }

    fn new_timer(
        &self,
        delay: Duration,
        summary: Option<String>,
        callback: ResultHandler,
    ) -> Option<TimerId> {
        let id = self.generate_id("timer");
        self.timers.borrow_mut().push((delay, summary));
        self.timer_handlers.borrow_mut().insert(id.clone(), callback);
        Some(TimerId(id))
    }

    fn request_cancel_timer(&self, id: &TimerId) {
        self.cancelled_timers.borrow_mut().push(id.0.clone());
        if let Some(handler) = self.timer_handlers.borrow_mut().remove(&id.0) {
            handler(Err(WorkflowError::canceled("timer canceled")));
        }
    }

    fn get_version(&self, change_id: &str, _min_supported: i32, max_supported: i32) -> i32 {
        self.versions
            .borrow()
            .get(change_id)
            .copied()
            .unwrap_or(max_supported)
    }

    fn side_effect(&self, producer: SideEffectProducer, callback: ResultHandler) {
        // Outside replay the SDK runs the producer and hands the recorded
        // value straight back.
        callback(Ok(producer()));
    }

    fn complete(&self, result: Option<Payloads>, error: Option<WorkflowError>) {
        *self.completion.borrow_mut() = Some((result, error));
    }

    fn upsert_search_attributes(
        &self,
        attributes: BTreeMap<String, Value>,
    ) -> tembridge_core::Result<()> {
        self.search_attribute_upserts.borrow_mut().push(attributes);
        Ok(())
    }

    fn upsert_typed_search_attributes(
        &self,
        updates: Vec<SearchAttributeUpdate>,
    ) -> tembridge_core::Result<()> {
        self.typed_search_attribute_upserts.borrow_mut().push(updates);
        Ok(())
    }

    fn upsert_memo(&self, memo: BTreeMap<String, Value>) -> tembridge_core::Result<()> {
        self.memo_upserts.borrow_mut().push(memo);
        Ok(())
    }

    fn signal_external_workflow(
        &self,
        namespace: &str,
        workflow_id: &str,
        run_id: &str,
        _signal_name: &str,
        _input: Option<Payloads>,
        _header: Option<Header>,
        _child_workflow_only: bool,
        callback: ResultHandler,
    ) {
        self.external_signals.borrow_mut().push((
            namespace.to_string(),
            workflow_id.to_string(),
            run_id.to_string(),
        ));
        self.external_handlers.borrow_mut().push(callback);
    }

    fn request_cancel_external_workflow(
        &self,
        namespace: &str,
        workflow_id: &str,
        run_id: &str,
        callback: ResultHandler,
    ) {
        self.external_cancels.borrow_mut().push((
            namespace.to_string(),
            workflow_id.to_string(),
            run_id.to_string(),
        ));
        self.external_handlers.borrow_mut().push(callback);
    }

    fn queue_update(&self, name: &str, handler: UpdateQueuedHandler) {
        self.queued_updates.borrow_mut().push(name.to_string());
        // The real SDK defers this into its update loop; for tests the loop
        // is "right now".
        handler();
    }
}

// ============================================================================
// Update callback + metrics recorders
// ============================================================================

#[derive(Default)]
pub struct RecordingUpdateCallbacks {
    pub accepted: Cell<bool>,
    pub rejected: RefCell<Option<WorkflowError>>,
    pub completed: RefCell<Option<(Option<Payloads>, Option<WorkflowError>)>>,
}

impl RecordingUpdateCallbacks {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }
}

impl UpdateCallbacks for RecordingUpdateCallbacks {
    fn accept(&self) {
        self.accepted.set(true);
    }

    fn reject(&self, error: WorkflowError) {
        *self.rejected.borrow_mut() = Some(error);
    }

    fn complete(&self, result: Option<Payloads>, error: Option<WorkflowError>) {
        *self.completed.borrow_mut() = Some((result, error));
    }
}

#[derive(Default)]
pub struct RecordingMetrics {
    pub gauges: RefCell<Vec<(String, f64)>>,
}

impl RecordingMetrics {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }
}

impl MetricsSink for RecordingMetrics {
    fn update_gauge(&self, name: &str, value: f64) {
        self.gauges.borrow_mut().push((name.to_string(), value));
    }
}

// ============================================================================
// Harness
// ============================================================================

pub const RUN_ID: &str = "run-aa11";

/// Environment, pool and coordinator wired together for one run.
pub fn setup() -> (Rc<MockEnvironment>, Rc<MockPool>, Coordinator) {
    init_logging();
    let env = MockEnvironment::new(RUN_ID);
    let pool = MockPool::new();
    let coordinator = Coordinator::new(
        env.clone(),
        pool.clone(),
        Arc::new(PayloadPool::new()),
        None,
        "workflows",
        4242,
    );
    (env, pool, coordinator)
}
