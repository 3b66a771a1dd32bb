// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire protocol between the bridge host and external workflow workers.
//!
//! The host batches commands for the worker into a [`Frame`](proto::Frame) of
//! [`Message`]s, ships it with a per-tick [`Context`] header as one transport
//! [`Payload`], and decodes the worker's reply the same way. Command options
//! are JSON; payloads, headers and failures are protobuf blobs that the
//! bridge never inspects.
//!
//! # Layers
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Batch: Context header + ordered Message sequence    │
//! ├──────────────────────────────────────────────────────┤
//! │  Commands: discriminator string + JSON options       │
//! ├──────────────────────────────────────────────────────┤
//! │  Serialization: Protobuf (prost) + JSON (serde)      │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The byte-level transport underneath (framing, checksums, the worker
//! processes themselves) belongs to the pool that executes payloads; this
//! crate only defines the payload contents and the reply flags the host
//! must honor.

pub mod codec;
pub mod command;
pub mod context;
pub mod message;
pub mod payload;

// Generated protobuf types.
pub mod proto {
    include!(concat!(env!("OUT_DIR"), "/tembridge.v1.rs"));
}

pub use codec::{Codec, CodecError};
pub use command::Command;
pub use context::Context;
pub use message::Message;
pub use payload::{Payload, PayloadPool, STREAM};

// Re-export the opaque value types most callers need.
pub use proto::{Failure, Header, Payloads};
