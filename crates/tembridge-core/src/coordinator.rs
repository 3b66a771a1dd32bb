// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-run workflow coordinator.
//!
//! One coordinator exists per running workflow instance. It turns the SDK's
//! push-model callbacks (task started, signal, query, update, cancel) into
//! batched protocol commands for the external worker, and turns the worker's
//! commands back into SDK primitives, preserving the determinism contract:
//!
//! - Outbound messages carry strictly increasing ids and flush in FIFO order.
//! - Inbound messages dispatch in receipt order, exactly once.
//! - SDK result handlers never resolve directly into the queue while the
//!   dispatch loop is idle; they are staged on a callback queue and drained
//!   by the next tick. While the loop runs (`in_loop`), handlers resolve
//!   inline — a cancel issued mid-tick fires its result handler from inside
//!   the cancel request, and that resolution must land in the outbound
//!   buffer before the cancel acknowledgement does.
//!
//! All state lives behind `Rc` with per-field interior mutability. Borrows
//! are never held across an SDK call, which is what makes the re-entrant
//! handler invocations above safe without threads or locks.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::canceller::Canceller;
use crate::converter::FailureConverter;
use crate::environment::{
    LocalActivityResultHandler, ResultHandler, UpdateCallbacks, WorkflowEnvironment,
};
use crate::error::{BridgeError, Result};
use crate::ids::IdRegistry;
use crate::metrics::{MetricsSink, POOL_QUEUE_SIZE, WORKFLOWS_POOL_QUEUE_SIZE};
use crate::pool::PoolExecutor;
use crate::queue::MessageQueue;
use crate::types::{
    ActivityParams, ChildWorkflowParams, ContinueAsNewParams, LocalActivityParams,
    LocalActivityResult, SearchAttributeKind, SearchAttributeUpdate, SearchAttributeValue,
    WorkflowError,
};
use tembridge_protocol::command::{
    CancelWorkflowOptions, InvokeQueryOptions, InvokeSignalOptions, InvokeUpdateOptions,
    SearchAttributeOperation, SearchAttributeType, StartWorkflowOptions, TypedSearchAttribute,
};
use tembridge_protocol::proto::{Failure, Header, Payloads};
use tembridge_protocol::{Codec, Command, Context, Message, Payload, PayloadPool};

const COMPLETED: &str = "completed";
const VALIDATE_EXECUTE: &str = "validate_execute";

type DeferredCallback = Box<dyn FnOnce() -> Result<()>>;
type UpdateHandler = Box<dyn FnOnce(Option<Payloads>, Option<Failure>)>;

/// Coordinator for a single workflow run.
pub struct Coordinator {
    inner: Rc<Inner>,
}

struct Inner {
    env: Rc<dyn WorkflowEnvironment>,
    pool: Rc<dyn PoolExecutor>,
    codec: Codec,
    payload_pool: Arc<PayloadPool>,
    metrics: Option<Rc<dyn MetricsSink>>,
    failures: FailureConverter,
    rr_id: String,
    worker_pid: i32,

    header: RefCell<Option<Header>>,
    mq: RefCell<MessageQueue>,
    pipeline: RefCell<VecDeque<Message>>,
    callbacks: RefCell<VecDeque<DeferredCallback>>,
    canceller: RefCell<Canceller>,
    ids: RefCell<IdRegistry>,
    update_validate_cb: RefCell<HashMap<String, UpdateHandler>>,
    update_complete_cb: RefCell<HashMap<String, UpdateHandler>>,
    updates_seen: RefCell<BTreeSet<String>>,
    seq_id: Cell<u64>,
    in_loop: Cell<bool>,
    finished: Cell<bool>,
    // Errors raised inside handlers that cannot return one (continuable
    // callbacks); picked up by the drain loop.
    pending_error: RefCell<Option<BridgeError>>,
}

impl Coordinator {
    pub fn new(
        env: Rc<dyn WorkflowEnvironment>,
        pool: Rc<dyn PoolExecutor>,
        payload_pool: Arc<PayloadPool>,
        metrics: Option<Rc<dyn MetricsSink>>,
        rr_id: impl Into<String>,
        worker_pid: i32,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                env,
                pool,
                codec: Codec,
                payload_pool,
                metrics,
                failures: FailureConverter,
                rr_id: rr_id.into(),
                worker_pid,
                header: RefCell::new(None),
                mq: RefCell::new(MessageQueue::new()),
                pipeline: RefCell::new(VecDeque::new()),
                callbacks: RefCell::new(VecDeque::new()),
                canceller: RefCell::new(Canceller::new()),
                ids: RefCell::new(IdRegistry::new()),
                update_validate_cb: RefCell::new(HashMap::new()),
                update_complete_cb: RefCell::new(HashMap::new()),
                updates_seen: RefCell::new(BTreeSet::new()),
                seq_id: Cell::new(0),
                in_loop: Cell::new(false),
                finished: Cell::new(false),
                pending_error: RefCell::new(None),
            }),
        }
    }

    /// Stage the start command for the external worker. Called once when the
    /// SDK begins the execution; the command ships with the first tick.
    pub fn start(&self, input: Option<Payloads>, header: Option<Header>) {
        let info = self.inner.env.workflow_info();
        debug!(run_id = %info.run_id, workflow = %info.workflow_type, "workflow start");

        *self.inner.header.borrow_mut() = header.clone();
        self.inner.mq.borrow_mut().push_command(
            Command::StartWorkflow(StartWorkflowOptions {
                name: info.workflow_type,
                namespace: info.namespace,
                task_queue: info.task_queue,
                workflow_id: info.workflow_id,
                run_id: info.run_id,
                attempt: info.attempt,
            }),
            input,
            header,
        );
    }

    /// One workflow-task pass: flush staged commands and drain the inbound
    /// pipeline and the deferred callback queue until both are empty.
    pub fn on_tick(&self) -> Result<()> {
        self.inner.in_loop.set(true);
        let result = self.drain();
        self.inner.in_loop.set(false);
        result
    }

    /// Stage a signal invocation. Never fails.
    pub fn handle_signal(&self, name: &str, input: Option<Payloads>, header: Option<Header>) {
        let run_id = self.inner.env.workflow_info().run_id;
        debug!(run_id = %run_id, name, "signal request");
        self.inner.mq.borrow_mut().push_command(
            Command::InvokeSignal(InvokeSignalOptions {
                run_id,
                name: name.to_string(),
            }),
            input,
            header,
        );
    }

    /// Stage the workflow cancellation request.
    pub fn handle_cancel(&self) {
        let run_id = self.inner.env.workflow_info().run_id;
        debug!(run_id = %run_id, "workflow cancel request");
        let header = self.inner.header.borrow().clone();
        self.inner.mq.borrow_mut().push_command(
            Command::CancelWorkflow(CancelWorkflowOptions { run_id }),
            None,
            header,
        );
    }

    /// Run a query against the worker, blocking the SDK until the answer is
    /// back. Queries must not mutate workflow state, so this path bypasses
    /// the outbound buffer and the pipeline entirely: one message out, one
    /// message in.
    pub fn handle_query(
        &self,
        name: &str,
        args: Option<Payloads>,
        header: Option<Header>,
    ) -> Result<Option<Payloads>> {
        let run_id = self.inner.env.workflow_info().run_id;
        debug!(run_id = %run_id, name, "query request");

        let result = self.inner.run_command(
            Command::InvokeQuery(InvokeQueryOptions {
                run_id,
                name: name.to_string(),
            }),
            args,
            header,
        )?;

        if let Some(failure) = result.failure {
            return Err(BridgeError::Workflow(
                self.inner.failures.failure_to_error(failure),
            ));
        }
        Ok(result.payloads)
    }

    /// Register an update and stage its `validate_execute` invocation.
    ///
    /// The validation callback honors rejections only outside replay: an
    /// accepted update is already in history, so on replay the recorded
    /// acceptance wins regardless of what the worker answers now.
    pub fn handle_update(
        &self,
        name: &str,
        update_id: &str,
        input: Option<Payloads>,
        header: Option<Header>,
        callbacks: Rc<dyn UpdateCallbacks>,
    ) {
        let run_id = self.inner.env.workflow_info().run_id;
        debug!(run_id = %run_id, name, update_id, "update request received");

        self.inner.updates_seen.borrow_mut().insert(name.to_string());

        let inner = Rc::clone(&self.inner);
        let owned_name = name.to_string();
        let owned_id = update_id.to_string();
        let queued = Box::new(move || {
            let validate: UpdateHandler = {
                let env = Rc::clone(&inner.env);
                let callbacks = Rc::clone(&callbacks);
                let failures = inner.failures;
                Box::new(move |_payloads, failure| {
                    if !env.is_replaying() {
                        // Before acceptance the only possible answer is a
                        // rejection.
                        if let Some(failure) = failure {
                            callbacks.reject(failures.failure_to_error(failure));
                            return;
                        }
                    }
                    callbacks.accept();
                })
            };
            inner
                .update_validate_cb
                .borrow_mut()
                .insert(owned_id.clone(), validate);

            let complete: UpdateHandler = {
                let callbacks = Rc::clone(&callbacks);
                let failures = inner.failures;
                Box::new(move |payloads, failure| match failure {
                    Some(failure) => {
                        callbacks.complete(None, Some(failures.failure_to_error(failure)))
                    }
                    None => callbacks.complete(payloads, None),
                })
            };
            inner
                .update_complete_cb
                .borrow_mut()
                .insert(owned_id.clone(), complete);

            inner.mq.borrow_mut().push_command(
                Command::InvokeUpdate(InvokeUpdateOptions {
                    run_id,
                    update_id: owned_id,
                    name: owned_name,
                    kind: VALIDATE_EXECUTE.to_string(),
                }),
                input,
                header,
            );
        });

        self.inner.env.queue_update(name, queued);
    }

    /// Update names this run has seen, for surfacing the exposed updates.
    pub fn updates_seen(&self) -> Vec<String> {
        self.inner.updates_seen.borrow().iter().cloned().collect()
    }

    fn drain(&self) -> Result<()> {
        loop {
            if let Some(err) = self.inner.pending_error.borrow_mut().take() {
                return Err(err);
            }

            let message = self.inner.pipeline.borrow_mut().pop_front();
            if let Some(message) = message {
                self.dispatch(message)?;
                continue;
            }

            let callback = self.inner.callbacks.borrow_mut().pop_front();
            if let Some(callback) = callback {
                callback()?;
                continue;
            }

            if !self.inner.mq.borrow().is_empty() {
                self.inner.flush_queue()?;
                continue;
            }

            break;
        }
        Ok(())
    }

    fn dispatch(&self, message: Message) -> Result<()> {
        if self.inner.finished.get() {
            // The run already completed; the SDK is tearing down and the
            // worker should not be talking anymore.
            warn!(id = message.id, "message received after workflow finished, dropping");
            return Ok(());
        }
        if !message.is_command() {
            debug!(id = message.id, "response message, nothing to dispatch");
            return Ok(());
        }
        self.handle_message(message)
    }

    fn handle_message(&self, message: Message) -> Result<()> {
        let Message {
            id,
            command,
            payloads,
            header,
            failure,
            ..
        } = message;
        let command = match command {
            Some(command) => command,
            None => return Ok(()),
        };

        match command {
            Command::ExecuteActivity(options) => {
                debug!(id, name = %options.name, "activity request");
                let info = self.inner.env.workflow_info();
                let params =
                    ActivityParams::from_options(options, payloads, header, &info.task_queue);
                let activity_id = self
                    .inner
                    .env
                    .execute_activity(params, self.create_callback(id, "activity"));

                let env = Rc::clone(&self.inner.env);
                self.inner.canceller.borrow_mut().register(
                    id,
                    Box::new(move || {
                        debug!(activity_id = %activity_id, "cancel activity request");
                        env.request_cancel_activity(&activity_id);
                        Ok(())
                    }),
                );
            }

            Command::ExecuteLocalActivity(options) => {
                debug!(id, name = %options.name, "local activity request");
                let params = LocalActivityParams::from_options(options, payloads, header);
                let activity_id = self
                    .inner
                    .env
                    .execute_local_activity(params, self.create_local_activity_callback(id));

                let env = Rc::clone(&self.inner.env);
                self.inner.canceller.borrow_mut().register(
                    id,
                    Box::new(move || {
                        debug!(activity_id = %activity_id, "cancel local activity request");
                        env.request_cancel_local_activity(&activity_id);
                        Ok(())
                    }),
                );
            }

            Command::ExecuteChildWorkflow(options) => {
                debug!(id, name = %options.name, "execute child workflow request");
                let info = self.inner.env.workflow_info();
                let mut params =
                    ChildWorkflowParams::from_options(options, payloads, header, &info.task_queue);

                // Deterministic fallback id: runID + per-run counter.
                if params.workflow_id.is_empty() {
                    let next = self.inner.seq_id.get() + 1;
                    self.inner.seq_id.set(next);
                    params.workflow_id = format!("{}_{}", info.run_id, next);
                }

                let namespace = params.namespace.clone();
                let workflow_id = params.workflow_id.clone();

                let started = {
                    let inner = Rc::clone(&self.inner);
                    Box::new(move |result| {
                        inner.ids.borrow_mut().push(id, result);
                    })
                };
                self.inner.env.execute_child_workflow(
                    params,
                    self.create_callback(id, "ExecuteChildWorkflow"),
                    started,
                );

                let env = Rc::clone(&self.inner.env);
                self.inner.canceller.borrow_mut().register(
                    id,
                    Box::new(move || {
                        env.request_cancel_child_workflow(&namespace, &workflow_id);
                        Ok(())
                    }),
                );
            }

            Command::GetChildWorkflowExecution(options) => {
                debug!(id, command_id = options.id, "get child workflow execution request");
                let callback = self.create_callback(id, "GetChildWorkflow");
                let env = Rc::clone(&self.inner.env);
                self.inner.ids.borrow_mut().listen(
                    options.id,
                    Box::new(move |result| match result {
                        Err(err) => callback(Err(err)),
                        Ok(execution) => match env.data_converter().to_payloads(&execution) {
                            Ok(payloads) => callback(Ok(Some(payloads))),
                            Err(err) => callback(Err(WorkflowError::application(
                                &format!("failed to encode child workflow execution: {err}"),
                                true,
                            ))),
                        },
                    }),
                );
            }

            Command::NewTimer(options) => {
                debug!(id, ms = options.ms, "timer request");
                let timer_id = self.inner.env.new_timer(
                    Duration::from_millis(options.ms),
                    options.summary,
                    self.create_callback(id, "NewTimer"),
                );

                let env = Rc::clone(&self.inner.env);
                self.inner.canceller.borrow_mut().register(
                    id,
                    Box::new(move || {
                        if let Some(timer_id) = &timer_id {
                            debug!(timer_id = %timer_id, "cancel timer request");
                            env.request_cancel_timer(timer_id);
                        }
                        Ok(())
                    }),
                );
            }

            Command::GetVersion(options) => {
                debug!(id, change_id = %options.change_id, "get version request");
                let version = self.inner.env.get_version(
                    &options.change_id,
                    options.min_supported,
                    options.max_supported,
                );
                let result = self.inner.env.data_converter().to_payloads(&version)?;
                self.inner.mq.borrow_mut().push_response(id, Some(result));
                // The worker is blocked on this answer inside the current
                // round trip; ship it now instead of at tick end.
                self.inner.flush_queue()?;
            }

            Command::SideEffect(_) => {
                debug!(id, "side-effect request");
                let callback = self.create_continuable_callback(id, "SideEffect");
                self.inner
                    .env
                    .side_effect(Box::new(move || payloads), callback);
            }

            Command::UpdateValidated(options) => {
                debug!(update_id = %options.id, "validate update request");
                if options.id.is_empty() {
                    error!("update id is empty, can't validate update");
                    return Err(BridgeError::EmptyUpdateId { stage: "validate" });
                }

                let handler = self.inner.update_validate_cb.borrow_mut().remove(&options.id);
                match handler {
                    Some(handler) => {
                        let rejected = failure.is_some();
                        handler(payloads, failure);
                        if rejected {
                            self.inner.update_complete_cb.borrow_mut().remove(&options.id);
                        }
                    }
                    None => {
                        warn!(update_id = %options.id, "no such update id, can't validate update");
                    }
                }
            }

            Command::UpdateCompleted(options) => {
                debug!(update_id = %options.id, "complete update request");
                if options.id.is_empty() {
                    error!("update id is empty, can't complete update");
                    return Err(BridgeError::EmptyUpdateId { stage: "complete" });
                }

                let handler = self.inner.update_complete_cb.borrow_mut().remove(&options.id);
                match handler {
                    Some(handler) => handler(payloads, failure),
                    None => {
                        warn!(update_id = %options.id, "no such update id, can't complete update");
                    }
                }
            }

            Command::CompleteWorkflow(_) => {
                debug!(id, "complete workflow request");
                let ack = self.inner.env.data_converter().to_payloads(&COMPLETED)?;
                self.inner.mq.borrow_mut().push_response(id, Some(ack));
                self.inner.finished.set(true);

                match failure {
                    None => self.inner.env.complete(payloads, None),
                    Some(failure) => self
                        .inner
                        .env
                        .complete(None, Some(self.inner.failures.failure_to_error(failure))),
                }
            }

            Command::ContinueAsNew(options) => {
                debug!(id, name = %options.name, "continue-as-new request");
                let ack = self.inner.env.data_converter().to_payloads(&COMPLETED)?;
                self.inner.mq.borrow_mut().push_response(id, Some(ack));
                self.inner.finished.set(true);

                self.inner.env.complete(
                    None,
                    Some(WorkflowError::ContinueAsNew(Box::new(ContinueAsNewParams {
                        workflow_type: options.name,
                        input: payloads,
                        header,
                        task_queue: options.options.task_queue,
                        workflow_run_timeout_ms: options.options.workflow_run_timeout_ms,
                        workflow_task_timeout_ms: options.options.workflow_task_timeout_ms,
                    }))),
                );
            }

            Command::UpsertWorkflowSearchAttributes(options) => {
                debug!(id, "upsert search attributes request");
                self.inner
                    .env
                    .upsert_search_attributes(options.search_attributes)?;
            }

            Command::UpsertWorkflowTypedSearchAttributes(options) => {
                debug!(id, "upsert typed search attributes request");
                let updates = translate_search_attributes(options.search_attributes)?;
                if updates.is_empty() {
                    warn!("search attributes called, but no attributes were set");
                    return Ok(());
                }
                self.inner.env.upsert_typed_search_attributes(updates)?;
            }

            Command::SignalExternalWorkflow(options) => {
                debug!(id, "signal external workflow request");
                self.inner.env.signal_external_workflow(
                    &options.namespace,
                    &options.workflow_id,
                    &options.run_id,
                    &options.signal,
                    payloads,
                    header,
                    options.child_workflow_only,
                    self.create_callback(id, "SignalExternalWorkflow"),
                );
            }

            Command::CancelExternalWorkflow(options) => {
                debug!(id, "cancel external workflow request");
                self.inner.env.request_cancel_external_workflow(
                    &options.namespace,
                    &options.workflow_id,
                    &options.run_id,
                    self.create_callback(id, "CancelExternalWorkflow"),
                );
            }

            Command::Cancel(options) => {
                debug!(id, command_ids = ?options.ids, "cancel request");
                // Take the thunks out first: a thunk may re-enter the
                // coordinator through the SDK's synchronous result handler,
                // and that handler touches the canceller again.
                let thunks = self.inner.canceller.borrow_mut().take(&options.ids);
                let mut errors = Vec::new();
                for (command_id, thunk) in thunks {
                    if let Err(err) = thunk() {
                        warn!(id = command_id, %err, "cancel thunk failed");
                        errors.push(format!("id {command_id}: {err}"));
                    }
                }
                if !errors.is_empty() {
                    return Err(BridgeError::Cancel(errors.join("; ")));
                }

                let ack = self.inner.env.data_converter().to_payloads(&COMPLETED)?;
                self.inner.mq.borrow_mut().push_response(id, Some(ack));
                self.inner.flush_queue()?;
            }

            Command::Panic(options) => {
                debug!(message = %options.message, "panic");
                let failure = failure.unwrap_or_else(|| Failure {
                    message: options.message,
                    source: "worker".to_string(),
                    ..Default::default()
                });
                // Not wrapped: Temporal classifies retryability by failure
                // identity.
                return Err(BridgeError::Workflow(
                    self.inner.failures.failure_to_error(failure),
                ));
            }

            Command::UpsertMemo(options) => {
                debug!(id, "upsert memo request");
                if options.memo.is_empty() {
                    return Ok(());
                }
                self.inner.env.upsert_memo(options.memo)?;
            }

            // Host-originated commands coming back from the worker are a
            // protocol violation.
            other => {
                error!(id, command = other.name(), "undefined command");
                return Err(BridgeError::UndefinedCommand(other.name()));
            }
        }

        Ok(())
    }

    /// Result handler for activities, timers, children and external
    /// signals/cancels. Resolves inline while the dispatch loop runs,
    /// defers onto the callback queue otherwise.
    fn create_callback(&self, id: u64, kind: &'static str) -> ResultHandler {
        let inner = Rc::clone(&self.inner);
        Box::new(move |result| {
            if inner.in_loop.get() {
                debug!(id, kind, "calling callback in loop");
                resolve_result(&inner, id, kind, result);
                return;
            }

            debug!(id, kind, "deferring callback");
            let deferred = Rc::clone(&inner);
            inner.callbacks.borrow_mut().push_back(Box::new(move || {
                resolve_result(&deferred, id, kind, result);
                Ok(())
            }));
        })
    }

    fn create_local_activity_callback(&self, id: u64) -> LocalActivityResultHandler {
        let inner = Rc::clone(&self.inner);
        Box::new(move |result| {
            if inner.in_loop.get() {
                debug!(id, "calling local activity callback in loop");
                resolve_local_activity(&inner, id, result);
                return;
            }

            debug!(id, "deferring local activity callback");
            let deferred = Rc::clone(&inner);
            inner.callbacks.borrow_mut().push_back(Box::new(move || {
                resolve_local_activity(&deferred, id, result);
                Ok(())
            }));
        })
    }

    /// Result handler that flushes immediately after resolving, so the
    /// worker observes the value within the same round trip when the SDK
    /// fires the handler inline (side effects).
    fn create_continuable_callback(&self, id: u64, kind: &'static str) -> ResultHandler {
        let inner = Rc::clone(&self.inner);
        Box::new(move |result| {
            debug!(id, kind, "executing continuable callback");
            resolve_result(&inner, id, kind, result);
            if let Err(err) = inner.flush_queue() {
                error!(id, kind, %err, "flush after continuable callback failed");
                *inner.pending_error.borrow_mut() = Some(err);
            }
        })
    }
}

fn resolve_result(
    inner: &Inner,
    id: u64,
    kind: &'static str,
    result: std::result::Result<Option<Payloads>, WorkflowError>,
) {
    inner.canceller.borrow_mut().discard(id);
    match result {
        Err(err) => {
            debug!(id, kind, %err, "pushing error");
            let failure = inner.failures.error_to_failure(&err);
            inner.mq.borrow_mut().push_error(id, failure);
        }
        Ok(payloads) => {
            debug!(id, kind, "pushing response");
            inner.mq.borrow_mut().push_response(id, payloads);
        }
    }
}

fn resolve_local_activity(inner: &Inner, id: u64, result: LocalActivityResult) {
    inner.canceller.borrow_mut().discard(id);
    match result.error {
        Some(err) => {
            debug!(
                id,
                attempt = result.attempt,
                backoff_ms = result.backoff_ms,
                %err,
                "local activity failed"
            );
            let failure = inner.failures.error_to_failure(&err);
            inner.mq.borrow_mut().push_error(id, failure);
        }
        None => {
            debug!(id, "pushing local activity response");
            inner.mq.borrow_mut().push_response(id, result.result);
        }
    }
}

impl Inner {
    /// Per-tick batch context snapshot.
    fn context(&self) -> Context {
        let info = self.env.workflow_info();
        Context {
            task_queue: info.task_queue,
            tick_time: self.env.now().to_rfc3339_opts(SecondsFormat::Secs, true),
            replay: self.env.is_replaying(),
            history_len: info.history_length,
            history_size: info.history_size,
            continue_as_new_suggested: info.continue_as_new_suggested,
            rr_id: self.rr_id.clone(),
            worker_pid: self.worker_pid,
        }
    }

    fn update_gauge(&self, name: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.update_gauge(name, self.pool.queue_size() as f64);
        }
    }

    /// Ship the outbound buffer and append the decoded reply to the
    /// pipeline. A no-op when nothing is staged.
    fn flush_queue(&self) -> Result<()> {
        if self.mq.borrow().is_empty() {
            return Ok(());
        }

        self.update_gauge(WORKFLOWS_POOL_QUEUE_SIZE);
        let result = self.flush_buffered();
        self.update_gauge(WORKFLOWS_POOL_QUEUE_SIZE);
        result
    }

    fn flush_buffered(&self) -> Result<()> {
        let mut payload = self.payload_pool.acquire();
        let result = (|| -> Result<()> {
            {
                let mq = self.mq.borrow();
                self.codec.encode(&self.context(), &mut payload, mq.messages())?;
            }
            let reply = self.exchange(&payload)?;
            let messages = self.codec.decode(&reply)?;
            self.mq.borrow_mut().flush();
            self.pipeline.borrow_mut().extend(messages);
            Ok(())
        })();
        self.payload_pool.release(payload);
        result
    }

    /// Single-command exchange used by the query path: exactly one message
    /// out, exactly one back, nothing buffered.
    fn run_command(
        &self,
        command: Command,
        payloads: Option<Payloads>,
        header: Option<Header>,
    ) -> Result<Message> {
        let message = self
            .mq
            .borrow_mut()
            .allocate_message(command, payloads, header);

        self.update_gauge(POOL_QUEUE_SIZE);
        let result = self.run_allocated(&message);
        self.update_gauge(POOL_QUEUE_SIZE);
        result
    }

    fn run_allocated(&self, message: &Message) -> Result<Message> {
        let mut payload = self.payload_pool.acquire();
        let result = (|| -> Result<Message> {
            self.codec
                .encode(&self.context(), &mut payload, std::slice::from_ref(message))?;
            let reply = self.exchange(&payload)?;
            let mut messages = self.codec.decode(&reply)?;
            if messages.len() != 1 {
                return Err(BridgeError::UnexpectedPoolResponse);
            }
            messages.pop().ok_or(BridgeError::UnexpectedPoolResponse)
        })();
        self.payload_pool.release(payload);
        result
    }

    /// One pool round trip. The reply must already be resolved when the
    /// pool hands back its receiver; a stream reply is refused and the
    /// stream torn down.
    fn exchange(&self, payload: &Payload) -> Result<Payload> {
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let mut receiver = self.pool.exec(payload, stop_rx)?;

        let reply = match receiver.try_recv() {
            Ok(reply) => reply?,
            Err(_) => return Err(BridgeError::WorkerEmptyResponse),
        };
        if reply.is_stream() {
            let _ = stop_tx.try_send(());
            return Err(BridgeError::StreamingNotSupported);
        }
        Ok(reply)
    }
}

/// Translate the worker's typed search attribute map into SDK updates.
///
/// Per-key problems (missing value, type mismatch) are logged and skipped so
/// one bad key does not lose the rest. The exception is an unparsable
/// datetime, which fails the whole batch before anything is applied.
fn translate_search_attributes(
    attributes: BTreeMap<String, TypedSearchAttribute>,
) -> Result<Vec<SearchAttributeUpdate>> {
    use serde_json::Value;

    let mut updates = Vec::new();
    for (key, attribute) in attributes {
        if attribute.operation == SearchAttributeOperation::Unset {
            updates.push(SearchAttributeUpdate::Unset {
                key,
                kind: unset_kind(attribute.kind),
            });
            continue;
        }

        let value = match attribute.value {
            Some(value) => value,
            None => {
                warn!(%key, "field value is not set");
                continue;
            }
        };

        match attribute.kind {
            SearchAttributeType::Bool => match value.as_bool() {
                Some(flag) => updates.push(SearchAttributeUpdate::Set {
                    key,
                    value: SearchAttributeValue::Bool(flag),
                }),
                None => warn!(%key, ?value, "field value is not a bool type"),
            },

            SearchAttributeType::Float64 => match value.as_f64() {
                Some(float) => updates.push(SearchAttributeUpdate::Set {
                    key,
                    value: SearchAttributeValue::Float(float),
                }),
                None => warn!(%key, ?value, "field value is not a float64 type"),
            },

            SearchAttributeType::Int64 => match &value {
                Value::Number(number) => {
                    if let Some(int) = number.as_i64() {
                        updates.push(SearchAttributeUpdate::Set {
                            key,
                            value: SearchAttributeValue::Int(int),
                        });
                    } else if let Some(float) = number.as_f64() {
                        updates.push(SearchAttributeUpdate::Set {
                            key,
                            value: SearchAttributeValue::Int(float as i64),
                        });
                    } else {
                        warn!(%key, ?value, "field value is not an int type");
                    }
                }
                Value::String(digits) => match digits.parse::<i64>() {
                    Ok(int) => updates.push(SearchAttributeUpdate::Set {
                        key,
                        value: SearchAttributeValue::Int(int),
                    }),
                    Err(err) => warn!(%key, %err, "failed to parse int"),
                },
                _ => warn!(%key, ?value, "field value is not an int type"),
            },

            SearchAttributeType::Keyword => match value.as_str() {
                Some(text) => updates.push(SearchAttributeUpdate::Set {
                    key,
                    value: SearchAttributeValue::Keyword(text.to_string()),
                }),
                None => warn!(%key, ?value, "field value is not a string type"),
            },

            SearchAttributeType::KeywordList => match value {
                Value::Array(items) => {
                    // Heterogeneous lists keep their string elements; the
                    // rest are dropped.
                    let list: Vec<String> = items
                        .into_iter()
                        .filter_map(|item| match item {
                            Value::String(text) => Some(text),
                            _ => None,
                        })
                        .collect();
                    updates.push(SearchAttributeUpdate::Set {
                        key,
                        value: SearchAttributeValue::KeywordList(list),
                    });
                }
                other => warn!(%key, ?other, "field value is not a strings array type"),
            },

            SearchAttributeType::String => match value.as_str() {
                Some(text) => updates.push(SearchAttributeUpdate::Set {
                    key,
                    value: SearchAttributeValue::Text(text.to_string()),
                }),
                None => warn!(%key, ?value, "field value is not a string type"),
            },

            SearchAttributeType::Datetime => match value.as_str() {
                Some(text) => {
                    let parsed = chrono::DateTime::parse_from_rfc3339(text)?;
                    updates.push(SearchAttributeUpdate::Set {
                        key,
                        value: SearchAttributeValue::Datetime(parsed.with_timezone(&Utc)),
                    });
                }
                None => warn!(%key, ?value, "field value is not a datetime string"),
            },
        }
    }

    Ok(updates)
}

fn unset_kind(kind: SearchAttributeType) -> SearchAttributeKind {
    match kind {
        SearchAttributeType::Bool => SearchAttributeKind::Bool,
        SearchAttributeType::Float64 => SearchAttributeKind::Float,
        SearchAttributeType::Int64 => SearchAttributeKind::Int,
        SearchAttributeType::Keyword => SearchAttributeKind::Keyword,
        SearchAttributeType::KeywordList => SearchAttributeKind::KeywordList,
        SearchAttributeType::String => SearchAttributeKind::Text,
        SearchAttributeType::Datetime => SearchAttributeKind::Datetime,
    }
}
