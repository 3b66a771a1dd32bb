// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typed command set of the bridge protocol.
//!
//! On the wire every command is a discriminator string plus a JSON options
//! blob (see `Message.command` / `Message.options` in the protobuf schema).
//! This module gives each command a typed options struct so neither side has
//! to touch raw JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::CodecError;

/// Retry policy attached to activities and child workflows. All intervals are
/// in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default)]
    pub initial_interval_ms: u64,
    #[serde(default)]
    pub backoff_coefficient: f64,
    #[serde(default)]
    pub maximum_interval_ms: u64,
    #[serde(default)]
    pub maximum_attempts: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_retryable_error_types: Vec<String>,
}

/// Value type of a typed search attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchAttributeType {
    Bool,
    Float64,
    Int64,
    Keyword,
    KeywordList,
    String,
    Datetime,
}

/// Operation applied to a typed search attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchAttributeOperation {
    Set,
    Unset,
}

/// One typed search attribute update as sent by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedSearchAttribute {
    #[serde(rename = "type")]
    pub kind: SearchAttributeType,
    pub operation: SearchAttributeOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartWorkflowOptions {
    pub name: String,
    pub namespace: String,
    pub task_queue: String,
    pub workflow_id: String,
    pub run_id: String,
    #[serde(default)]
    pub attempt: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteActivityOptions {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_queue: Option<String>,
    #[serde(default)]
    pub schedule_to_close_timeout_ms: u64,
    #[serde(default)]
    pub schedule_to_start_timeout_ms: u64,
    #[serde(default)]
    pub start_to_close_timeout_ms: u64,
    #[serde(default)]
    pub heartbeat_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteLocalActivityOptions {
    pub name: String,
    #[serde(default)]
    pub schedule_to_close_timeout_ms: u64,
    #[serde(default)]
    pub start_to_close_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteChildWorkflowOptions {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub workflow_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_queue: Option<String>,
    #[serde(default)]
    pub workflow_execution_timeout_ms: u64,
    #[serde(default)]
    pub workflow_run_timeout_ms: u64,
    #[serde(default)]
    pub workflow_task_timeout_ms: u64,
    #[serde(default)]
    pub parent_close_policy: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetChildWorkflowExecutionOptions {
    /// Message id of the originating `ExecuteChildWorkflow` command.
    pub id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTimerOptions {
    /// Timer duration in milliseconds.
    pub ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetVersionOptions {
    pub change_id: String,
    pub min_supported: i32,
    pub max_supported: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffectOptions {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOptions {
    /// Update id the worker is validating or completing.
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteWorkflowOptions {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueAsNewWorkflowOptions {
    #[serde(default)]
    pub task_queue: String,
    #[serde(default)]
    pub workflow_run_timeout_ms: u64,
    #[serde(default)]
    pub workflow_task_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueAsNewOptions {
    pub name: String,
    #[serde(default)]
    pub options: ContinueAsNewWorkflowOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertSearchAttributesOptions {
    #[serde(default)]
    pub search_attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertTypedSearchAttributesOptions {
    #[serde(default)]
    pub search_attributes: BTreeMap<String, TypedSearchAttribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalExternalWorkflowOptions {
    #[serde(default)]
    pub namespace: String,
    pub workflow_id: String,
    #[serde(default)]
    pub run_id: String,
    pub signal: String,
    #[serde(default)]
    pub child_workflow_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelExternalWorkflowOptions {
    #[serde(default)]
    pub namespace: String,
    pub workflow_id: String,
    #[serde(default)]
    pub run_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOptions {
    /// Message ids of the outstanding commands to cancel.
    pub ids: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanicOptions {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertMemoOptions {
    #[serde(default)]
    pub memo: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeSignalOptions {
    pub run_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeQueryOptions {
    pub run_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeUpdateOptions {
    pub run_id: String,
    pub update_id: String,
    pub name: String,
    /// Invocation type; the only value currently produced is
    /// `"validate_execute"`.
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelWorkflowOptions {
    pub run_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetWorkerInfoOptions {
    /// Version of the bridge host, so workers can reject incompatible hosts.
    #[serde(default)]
    pub bridge_version: String,
}

/// Every command either side of the protocol can put into a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // host -> worker
    StartWorkflow(StartWorkflowOptions),
    InvokeSignal(InvokeSignalOptions),
    InvokeQuery(InvokeQueryOptions),
    InvokeUpdate(InvokeUpdateOptions),
    CancelWorkflow(CancelWorkflowOptions),
    GetWorkerInfo(GetWorkerInfoOptions),
    // worker -> host
    ExecuteActivity(ExecuteActivityOptions),
    ExecuteLocalActivity(ExecuteLocalActivityOptions),
    ExecuteChildWorkflow(ExecuteChildWorkflowOptions),
    GetChildWorkflowExecution(GetChildWorkflowExecutionOptions),
    NewTimer(NewTimerOptions),
    GetVersion(GetVersionOptions),
    SideEffect(SideEffectOptions),
    UpdateValidated(UpdateOptions),
    UpdateCompleted(UpdateOptions),
    CompleteWorkflow(CompleteWorkflowOptions),
    ContinueAsNew(ContinueAsNewOptions),
    UpsertWorkflowSearchAttributes(UpsertSearchAttributesOptions),
    UpsertWorkflowTypedSearchAttributes(UpsertTypedSearchAttributesOptions),
    SignalExternalWorkflow(SignalExternalWorkflowOptions),
    CancelExternalWorkflow(CancelExternalWorkflowOptions),
    Cancel(CancelOptions),
    Panic(PanicOptions),
    UpsertMemo(UpsertMemoOptions),
}

impl Command {
    /// Wire discriminator of this command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::StartWorkflow(_) => "StartWorkflow",
            Command::InvokeSignal(_) => "InvokeSignal",
            Command::InvokeQuery(_) => "InvokeQuery",
            Command::InvokeUpdate(_) => "InvokeUpdate",
            Command::CancelWorkflow(_) => "CancelWorkflow",
            Command::GetWorkerInfo(_) => "GetWorkerInfo",
            Command::ExecuteActivity(_) => "ExecuteActivity",
            Command::ExecuteLocalActivity(_) => "ExecuteLocalActivity",
            Command::ExecuteChildWorkflow(_) => "ExecuteChildWorkflow",
            Command::GetChildWorkflowExecution(_) => "GetChildWorkflowExecution",
            Command::NewTimer(_) => "NewTimer",
            Command::GetVersion(_) => "GetVersion",
            Command::SideEffect(_) => "SideEffect",
            Command::UpdateValidated(_) => "UpdateValidated",
            Command::UpdateCompleted(_) => "UpdateCompleted",
            Command::CompleteWorkflow(_) => "CompleteWorkflow",
            Command::ContinueAsNew(_) => "ContinueAsNew",
            Command::UpsertWorkflowSearchAttributes(_) => "UpsertWorkflowSearchAttributes",
            Command::UpsertWorkflowTypedSearchAttributes(_) => {
                "UpsertWorkflowTypedSearchAttributes"
            }
            Command::SignalExternalWorkflow(_) => "SignalExternalWorkflow",
            Command::CancelExternalWorkflow(_) => "CancelExternalWorkflow",
            Command::Cancel(_) => "Cancel",
            Command::Panic(_) => "Panic",
            Command::UpsertMemo(_) => "UpsertMemo",
        }
    }

    /// Serialize the options blob of this command.
    pub fn options(&self) -> Result<Vec<u8>, CodecError> {
        let bytes = match self {
            Command::StartWorkflow(o) => serde_json::to_vec(o)?,
            Command::InvokeSignal(o) => serde_json::to_vec(o)?,
            Command::InvokeQuery(o) => serde_json::to_vec(o)?,
            Command::InvokeUpdate(o) => serde_json::to_vec(o)?,
            Command::CancelWorkflow(o) => serde_json::to_vec(o)?,
            Command::GetWorkerInfo(o) => serde_json::to_vec(o)?,
            Command::ExecuteActivity(o) => serde_json::to_vec(o)?,
            Command::ExecuteLocalActivity(o) => serde_json::to_vec(o)?,
            Command::ExecuteChildWorkflow(o) => serde_json::to_vec(o)?,
            Command::GetChildWorkflowExecution(o) => serde_json::to_vec(o)?,
            Command::NewTimer(o) => serde_json::to_vec(o)?,
            Command::GetVersion(o) => serde_json::to_vec(o)?,
            Command::SideEffect(o) => serde_json::to_vec(o)?,
            Command::UpdateValidated(o) => serde_json::to_vec(o)?,
            Command::UpdateCompleted(o) => serde_json::to_vec(o)?,
            Command::CompleteWorkflow(o) => serde_json::to_vec(o)?,
            Command::ContinueAsNew(o) => serde_json::to_vec(o)?,
            Command::UpsertWorkflowSearchAttributes(o) => serde_json::to_vec(o)?,
            Command::UpsertWorkflowTypedSearchAttributes(o) => serde_json::to_vec(o)?,
            Command::SignalExternalWorkflow(o) => serde_json::to_vec(o)?,
            Command::CancelExternalWorkflow(o) => serde_json::to_vec(o)?,
            Command::Cancel(o) => serde_json::to_vec(o)?,
            Command::Panic(o) => serde_json::to_vec(o)?,
            Command::UpsertMemo(o) => serde_json::to_vec(o)?,
        };
        Ok(bytes)
    }

    /// Rebuild a command from its wire discriminator and options blob.
    ///
    /// An unknown discriminator is a protocol violation and fails the decode;
    /// so do options that don't match the command's schema.
    pub fn from_wire(name: &str, options: &[u8]) -> Result<Self, CodecError> {
        // Commands with an all-optional schema may arrive with empty options.
        let options = if options.is_empty() { b"{}" } else { options };

        let command = match name {
            "StartWorkflow" => Command::StartWorkflow(parse(name, options)?),
            "InvokeSignal" => Command::InvokeSignal(parse(name, options)?),
            "InvokeQuery" => Command::InvokeQuery(parse(name, options)?),
            "InvokeUpdate" => Command::InvokeUpdate(parse(name, options)?),
            "CancelWorkflow" => Command::CancelWorkflow(parse(name, options)?),
            "GetWorkerInfo" => Command::GetWorkerInfo(parse(name, options)?),
            "ExecuteActivity" => Command::ExecuteActivity(parse(name, options)?),
            "ExecuteLocalActivity" => Command::ExecuteLocalActivity(parse(name, options)?),
            "ExecuteChildWorkflow" => Command::ExecuteChildWorkflow(parse(name, options)?),
            "GetChildWorkflowExecution" => {
                Command::GetChildWorkflowExecution(parse(name, options)?)
            }
            "NewTimer" => Command::NewTimer(parse(name, options)?),
            "GetVersion" => Command::GetVersion(parse(name, options)?),
            "SideEffect" => Command::SideEffect(parse(name, options)?),
            "UpdateValidated" => Command::UpdateValidated(parse(name, options)?),
            "UpdateCompleted" => Command::UpdateCompleted(parse(name, options)?),
            "CompleteWorkflow" => Command::CompleteWorkflow(parse(name, options)?),
            "ContinueAsNew" => Command::ContinueAsNew(parse(name, options)?),
            "UpsertWorkflowSearchAttributes" => {
                Command::UpsertWorkflowSearchAttributes(parse(name, options)?)
            }
            "UpsertWorkflowTypedSearchAttributes" => {
                Command::UpsertWorkflowTypedSearchAttributes(parse(name, options)?)
            }
            "SignalExternalWorkflow" => Command::SignalExternalWorkflow(parse(name, options)?),
            "CancelExternalWorkflow" => Command::CancelExternalWorkflow(parse(name, options)?),
            "Cancel" => Command::Cancel(parse(name, options)?),
            "Panic" => Command::Panic(parse(name, options)?),
            "UpsertMemo" => Command::UpsertMemo(parse(name, options)?),
            other => return Err(CodecError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

fn parse<T: serde::de::DeserializeOwned>(name: &str, options: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(options).map_err(|err| CodecError::MalformedOptions {
        command: name.to_string(),
        source: err,
    })
}
