// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain view of a protocol message.

use crate::codec::CodecError;
use crate::command::Command;
use crate::proto;

/// One protocol message with its command decoded.
///
/// A message with a command is an invocation; a message without one is the
/// response to the earlier message with the same id. Payloads, header and
/// failure are opaque to the bridge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub id: u64,
    pub command: Option<Command>,
    pub payloads: Option<proto::Payloads>,
    pub header: Option<proto::Header>,
    pub failure: Option<proto::Failure>,
    pub history_length: i64,
}

impl Message {
    /// Response acknowledging message `id` with optional result payloads.
    pub fn response(id: u64, payloads: Option<proto::Payloads>) -> Self {
        Self {
            id,
            payloads,
            ..Default::default()
        }
    }

    /// Error response for message `id`.
    pub fn error(id: u64, failure: proto::Failure) -> Self {
        Self {
            id,
            failure: Some(failure),
            ..Default::default()
        }
    }

    pub fn is_command(&self) -> bool {
        self.command.is_some()
    }

    pub fn to_proto(&self) -> Result<proto::Message, CodecError> {
        let (command, options) = match &self.command {
            Some(command) => (command.name().to_string(), command.options()?),
            None => (String::new(), Vec::new()),
        };
        Ok(proto::Message {
            id: self.id,
            command,
            options,
            failure: self.failure.clone(),
            payloads: self.payloads.clone(),
            header: self.header.clone(),
            history_length: self.history_length,
        })
    }

    pub fn from_proto(message: proto::Message) -> Result<Self, CodecError> {
        let command = if message.command.is_empty() {
            None
        } else {
            Some(Command::from_wire(&message.command, &message.options)?)
        };
        Ok(Self {
            id: message.id,
            command,
            payloads: message.payloads,
            header: message.header,
            failure: message.failure,
            history_length: message.history_length,
        })
    }
}
