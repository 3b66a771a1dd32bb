// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Transport payload exchanged with the worker pool.
//!
//! A [`Payload`] is one pool round-trip unit: the batch context travels in the
//! `context` slot, the protobuf-encoded [`Frame`](crate::proto::Frame) in
//! `body`, and a flag byte describes the reply shape. The framing underneath
//! (length prefixes, checksums) belongs to the pool transport, not to this
//! crate; only the flag semantics surface here.

use std::sync::Mutex;

/// Reply flag bit: the worker opened a response stream instead of answering
/// with a single frame. The bridge does not support streams and must abort
/// the task when it sees this bit.
pub const STREAM: u8 = 1 << 2;

/// One encode/decode unit handed to the worker pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    /// Batch context (JSON), opaque to the transport.
    pub context: Vec<u8>,
    /// Protobuf-encoded frame.
    pub body: Vec<u8>,
    /// Transport flags of the reply; see [`STREAM`].
    pub flags: u8,
}

impl Payload {
    /// True when the reply carries the stream flag.
    pub fn is_stream(&self) -> bool {
        self.flags & STREAM != 0
    }

    /// Reset all fields so the buffer can be reused.
    pub fn clear(&mut self) {
        self.context.clear();
        self.body.clear();
        self.flags = 0;
    }
}

/// Process-wide free list of scratch payload buffers.
///
/// Flush paths acquire a buffer, encode into it, and release it once the
/// round trip finished. Buffers are cleared on release, never on acquire.
#[derive(Debug, Default)]
pub struct PayloadPool {
    free: Mutex<Vec<Payload>>,
}

impl PayloadPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a buffer from the free list, or allocate a fresh one.
    pub fn acquire(&self) -> Payload {
        self.free
            .lock()
            .expect("payload pool lock poisoned")
            .pop()
            .unwrap_or_default()
    }

    /// Return a buffer to the free list. Fields are zeroed before reuse.
    pub fn release(&self, mut payload: Payload) {
        payload.clear();
        self.free
            .lock()
            .expect("payload pool lock poisoned")
            .push(payload);
    }
}
