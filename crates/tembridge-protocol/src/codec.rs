// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Batch codec: context + messages in, transport payload out, and back.

use prost::Message as _;
use thiserror::Error;

use crate::context::Context;
use crate::message::Message;
use crate::payload::Payload;
use crate::proto;

/// Errors that can occur while encoding or decoding a batch.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("malformed options for {command}: {source}")]
    MalformedOptions {
        command: String,
        source: serde_json::Error,
    },
}

/// Encodes batches for the worker pool and decodes its replies.
///
/// The batch context travels as JSON in the payload context slot; the
/// messages travel as one protobuf [`proto::Frame`] in the body. Message
/// order is significant and preserved in both directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec;

impl Codec {
    /// Encode `context` and `messages` into `payload`.
    pub fn encode(
        &self,
        context: &Context,
        payload: &mut Payload,
        messages: &[Message],
    ) -> Result<(), CodecError> {
        payload.context = serde_json::to_vec(context)?;
        let frame = proto::Frame {
            messages: messages
                .iter()
                .map(Message::to_proto)
                .collect::<Result<Vec<_>, _>>()?,
        };
        payload.body = frame.encode_to_vec();
        payload.flags = 0;
        Ok(())
    }

    /// Decode a reply payload into its ordered messages.
    pub fn decode(&self, payload: &Payload) -> Result<Vec<Message>, CodecError> {
        let frame = proto::Frame::decode(payload.body.as_slice())?;
        frame.messages.into_iter().map(Message::from_proto).collect()
    }

    /// Decode the batch context of a payload.
    pub fn decode_context(&self, payload: &Payload) -> Result<Context, CodecError> {
        Ok(serde_json::from_slice(&payload.context)?)
    }
}
