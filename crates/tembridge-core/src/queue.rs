// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Outbound message queue with monotonic id allocation.

use tembridge_protocol::proto::{Failure, Header, Payloads};
use tembridge_protocol::{Command, Message};

/// Buffers outbound messages for the next flush and hands out message ids.
///
/// Ids are unique per workflow run, start at 0 and increase by exactly one
/// per allocation, regardless of whether the allocated message is buffered.
/// The buffer itself is FIFO; [`flush`](Self::flush) clears it only after a
/// successful transport round trip.
#[derive(Debug, Default)]
pub struct MessageQueue {
    seq: u64,
    queue: Vec<Message>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.seq;
        self.seq += 1;
        id
    }

    /// Allocate an id and build a command message without buffering it.
    ///
    /// Used by the single-shot query path, which sends the message on its
    /// own and must not leave it behind for the next flush.
    pub fn allocate_message(
        &mut self,
        command: Command,
        payloads: Option<Payloads>,
        header: Option<Header>,
    ) -> Message {
        Message {
            id: self.next_id(),
            command: Some(command),
            payloads,
            header,
            failure: None,
            history_length: 0,
        }
    }

    /// Allocate and buffer a command message; returns its id.
    pub fn push_command(
        &mut self,
        command: Command,
        payloads: Option<Payloads>,
        header: Option<Header>,
    ) -> u64 {
        let message = self.allocate_message(command, payloads, header);
        let id = message.id;
        self.queue.push(message);
        id
    }

    /// Buffer a response to a worker-initiated command.
    pub fn push_response(&mut self, id: u64, payloads: Option<Payloads>) {
        self.queue.push(Message::response(id, payloads));
    }

    /// Buffer an error response to a worker-initiated command.
    pub fn push_error(&mut self, id: u64, failure: Failure) {
        self.queue.push(Message::error(id, failure));
    }

    /// Buffered messages, in issuance order.
    pub fn messages(&self) -> &[Message] {
        &self.queue
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Clear the buffer. Called only after a successful round trip.
    pub fn flush(&mut self) {
        self.queue.clear();
    }
}
