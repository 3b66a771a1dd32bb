// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SDK-side value types consumed and produced by the coordinator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tembridge_protocol::command::{
    ExecuteActivityOptions, ExecuteChildWorkflowOptions, ExecuteLocalActivityOptions, RetryPolicy,
};
use tembridge_protocol::proto::{Failure, Header, Payloads};

/// Identity and history snapshot of the running workflow, as reported by the
/// SDK environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowInfo {
    pub namespace: String,
    pub task_queue: String,
    pub workflow_type: String,
    pub workflow_id: String,
    pub run_id: String,
    pub attempt: i32,
    pub history_length: i64,
    pub history_size: i64,
    pub continue_as_new_suggested: bool,
}

/// Handle of a started (child or external) workflow execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    #[serde(rename = "ID")]
    pub workflow_id: String,
    #[serde(rename = "RunID")]
    pub run_id: String,
}

/// Id the SDK assigns to a scheduled activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityId(pub String);

impl std::fmt::Display for ActivityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Id the SDK assigns to a started timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerId(pub String);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameters for scheduling an activity through the SDK.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityParams {
    pub activity_type: String,
    pub task_queue: String,
    pub schedule_to_close_timeout_ms: u64,
    pub schedule_to_start_timeout_ms: u64,
    pub start_to_close_timeout_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub activity_id: Option<String>,
    pub retry_policy: Option<RetryPolicy>,
    pub input: Option<Payloads>,
    pub header: Option<Header>,
}

impl ActivityParams {
    /// Build SDK parameters from the worker's command options. The workflow's
    /// own task queue is the default when the command names none.
    pub fn from_options(
        options: ExecuteActivityOptions,
        input: Option<Payloads>,
        header: Option<Header>,
        default_task_queue: &str,
    ) -> Self {
        Self {
            activity_type: options.name,
            task_queue: options
                .task_queue
                .unwrap_or_else(|| default_task_queue.to_string()),
            schedule_to_close_timeout_ms: options.schedule_to_close_timeout_ms,
            schedule_to_start_timeout_ms: options.schedule_to_start_timeout_ms,
            start_to_close_timeout_ms: options.start_to_close_timeout_ms,
            heartbeat_timeout_ms: options.heartbeat_timeout_ms,
            activity_id: options.activity_id,
            retry_policy: options.retry_policy,
            input,
            header,
        }
    }
}

/// Parameters for scheduling a local activity through the SDK.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalActivityParams {
    pub activity_type: String,
    pub schedule_to_close_timeout_ms: u64,
    pub start_to_close_timeout_ms: u64,
    pub retry_policy: Option<RetryPolicy>,
    pub input: Option<Payloads>,
    pub header: Option<Header>,
}

impl LocalActivityParams {
    pub fn from_options(
        options: ExecuteLocalActivityOptions,
        input: Option<Payloads>,
        header: Option<Header>,
    ) -> Self {
        Self {
            activity_type: options.name,
            schedule_to_close_timeout_ms: options.schedule_to_close_timeout_ms,
            start_to_close_timeout_ms: options.start_to_close_timeout_ms,
            retry_policy: options.retry_policy,
            input,
            header,
        }
    }
}

/// Parameters for starting a child workflow through the SDK.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChildWorkflowParams {
    pub namespace: String,
    pub workflow_id: String,
    pub workflow_type: String,
    pub task_queue: String,
    pub workflow_execution_timeout_ms: u64,
    pub workflow_run_timeout_ms: u64,
    pub workflow_task_timeout_ms: u64,
    pub parent_close_policy: i32,
    pub cron_schedule: Option<String>,
    pub retry_policy: Option<RetryPolicy>,
    pub input: Option<Payloads>,
    pub header: Option<Header>,
}

impl ChildWorkflowParams {
    pub fn from_options(
        options: ExecuteChildWorkflowOptions,
        input: Option<Payloads>,
        header: Option<Header>,
        default_task_queue: &str,
    ) -> Self {
        Self {
            namespace: options.namespace,
            workflow_id: options.workflow_id,
            workflow_type: options.name,
            task_queue: options
                .task_queue
                .unwrap_or_else(|| default_task_queue.to_string()),
            workflow_execution_timeout_ms: options.workflow_execution_timeout_ms,
            workflow_run_timeout_ms: options.workflow_run_timeout_ms,
            workflow_task_timeout_ms: options.workflow_task_timeout_ms,
            parent_close_policy: options.parent_close_policy,
            cron_schedule: options.cron_schedule,
            retry_policy: options.retry_policy,
            input,
            header,
        }
    }
}

/// Parameters carried by a continue-as-new completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContinueAsNewParams {
    pub workflow_type: String,
    pub input: Option<Payloads>,
    pub header: Option<Header>,
    pub task_queue: String,
    pub workflow_run_timeout_ms: u64,
    pub workflow_task_timeout_ms: u64,
}

/// Result of a local activity attempt, including retry metadata on failure.
#[derive(Debug)]
pub struct LocalActivityResult {
    pub result: Option<Payloads>,
    pub error: Option<WorkflowError>,
    pub attempt: i32,
    pub backoff_ms: u64,
}

/// Error delivered to or received from the SDK environment.
///
/// The `Failure` variant wraps the wire-level failure without translation so
/// Temporal's retryability classification survives the bridge in both
/// directions. `ContinueAsNew` is the completion sentinel: completing a
/// workflow with it ends the current run and starts a fresh one.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowError {
    Failure(Box<Failure>),
    ContinueAsNew(Box<ContinueAsNewParams>),
}

impl WorkflowError {
    /// Application-level failure with the given message.
    pub fn application(message: &str, non_retryable: bool) -> Self {
        WorkflowError::Failure(Box::new(Failure {
            message: message.to_string(),
            source: "tembridge".to_string(),
            application_failure_info: Some(
                tembridge_protocol::proto::ApplicationFailureInfo {
                    r#type: "ApplicationError".to_string(),
                    non_retryable,
                    details: None,
                },
            ),
            ..Default::default()
        }))
    }

    /// Cancellation failure, delivered when an outstanding command is
    /// cancelled before it resolved.
    pub fn canceled(message: &str) -> Self {
        WorkflowError::Failure(Box::new(Failure {
            message: message.to_string(),
            source: "tembridge".to_string(),
            canceled_failure_info: Some(tembridge_protocol::proto::CanceledFailureInfo {
                details: None,
            }),
            ..Default::default()
        }))
    }

    /// True when this error represents a cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, WorkflowError::Failure(f) if f.canceled_failure_info.is_some())
    }
}

impl std::fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowError::Failure(failure) => f.write_str(&failure.message),
            WorkflowError::ContinueAsNew(params) => {
                write!(f, "continue as new: {}", params.workflow_type)
            }
        }
    }
}

impl std::error::Error for WorkflowError {}

/// Kind of a typed search attribute, used for value-less unsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchAttributeKind {
    Bool,
    Float,
    Int,
    Keyword,
    KeywordList,
    Text,
    Datetime,
}

/// Value of a typed search attribute set.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchAttributeValue {
    Bool(bool),
    Float(f64),
    Int(i64),
    Keyword(String),
    KeywordList(Vec<String>),
    Text(String),
    Datetime(DateTime<Utc>),
}

/// One typed search attribute update handed to the SDK.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchAttributeUpdate {
    Set {
        key: String,
        value: SearchAttributeValue,
    },
    Unset {
        key: String,
        kind: SearchAttributeKind,
    },
}

impl SearchAttributeUpdate {
    pub fn key(&self) -> &str {
        match self {
            SearchAttributeUpdate::Set { key, .. } => key,
            SearchAttributeUpdate::Unset { key, .. } => key,
        }
    }
}
