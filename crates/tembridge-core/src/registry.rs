// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker-info handshake.
//!
//! At pool startup the host asks the external worker what it can run. The
//! exchange is a single `GetWorkerInfo` round trip; the worker answers with
//! one payload per declared worker, each a JSON `WorkerInfo` document. The
//! resulting registry is handed to the SDK so it registers exactly the
//! workflows and activities the worker actually implements.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::converter::DataConverter;
use crate::error::{BridgeError, Result};
use crate::pool::PoolExecutor;
use crate::queue::MessageQueue;
use tembridge_protocol::command::GetWorkerInfoOptions;
use tembridge_protocol::{Codec, Command, Context, Payload};

/// One workflow the external worker declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDeclaration {
    pub name: String,
    #[serde(default)]
    pub queries: Vec<String>,
    #[serde(default)]
    pub signals: Vec<String>,
}

/// One activity the external worker declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDeclaration {
    pub name: String,
}

/// Self-description of one external worker process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInfo {
    #[serde(default)]
    pub pid: i32,
    #[serde(default)]
    pub workflows: Vec<WorkflowDeclaration>,
    #[serde(default)]
    pub activities: Vec<ActivityDeclaration>,
}

/// Combined declarations of all workers behind one pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerRegistry {
    workers: Vec<WorkerInfo>,
}

impl WorkerRegistry {
    /// Build a registry, rejecting duplicate workflow declarations.
    pub fn from_workers(workers: Vec<WorkerInfo>) -> Result<Self> {
        let mut seen = HashSet::new();
        for worker in &workers {
            for workflow in &worker.workflows {
                if !seen.insert(workflow.name.as_str()) {
                    return Err(BridgeError::DuplicateWorkflow(workflow.name.clone()));
                }
            }
        }
        Ok(Self { workers })
    }

    pub fn workers(&self) -> &[WorkerInfo] {
        &self.workers
    }

    /// Names of all declared workflows.
    pub fn workflow_names(&self) -> Vec<&str> {
        self.workers
            .iter()
            .flat_map(|w| w.workflows.iter().map(|wf| wf.name.as_str()))
            .collect()
    }

    /// Names of all declared activities, deduplicated across workers.
    pub fn activity_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.workers
            .iter()
            .flat_map(|w| w.activities.iter().map(|a| a.name.as_str()))
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

/// Query the pool for its worker declarations. Called once at startup,
/// before any workflow runs.
pub fn fetch_worker_info(
    codec: &Codec,
    pool: &dyn PoolExecutor,
    bridge_version: &str,
) -> Result<WorkerRegistry> {
    let message = MessageQueue::new().allocate_message(
        Command::GetWorkerInfo(GetWorkerInfoOptions {
            bridge_version: bridge_version.to_string(),
        }),
        None,
        None,
    );

    let mut payload = Payload::default();
    codec.encode(
        &Context::default(),
        &mut payload,
        std::slice::from_ref(&message),
    )?;

    let (stop_tx, stop_rx) = mpsc::channel(1);
    let mut receiver = pool.exec(&payload, stop_rx)?;
    let reply = match receiver.try_recv() {
        Ok(reply) => reply?,
        Err(_) => return Err(BridgeError::WorkerEmptyResponse),
    };
    if reply.is_stream() {
        let _ = stop_tx.try_send(());
        return Err(BridgeError::StreamingNotSupported);
    }

    let mut messages = codec.decode(&reply)?;
    if messages.len() != 1 {
        return Err(BridgeError::UnexpectedPoolResponse);
    }
    let message = messages.remove(0);
    if let Some(failure) = message.failure {
        return Err(BridgeError::Environment(failure.message));
    }

    let converter = DataConverter;
    let mut workers = Vec::new();
    for payload in message.payloads.unwrap_or_default().payloads {
        let info: WorkerInfo = converter.from_payload(&payload)?;
        debug!(
            pid = info.pid,
            workflows = info.workflows.len(),
            activities = info.activities.len(),
            "worker declared"
        );
        workers.push(info);
    }

    let registry = WorkerRegistry::from_workers(workers)?;
    info!(
        workflows = ?registry.workflow_names(),
        "workflow worker pool initialized"
    );
    Ok(registry)
}
