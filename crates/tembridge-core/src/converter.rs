// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Default data and failure converters.
//!
//! Payload contents are owned by the converters on either side of the
//! bridge; the coordinator only converts the handful of values it produces
//! itself (acknowledgements, versions, execution handles). The default
//! converter is JSON with the standard `encoding` metadata marker.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::types::WorkflowError;
use tembridge_protocol::proto::{Failure, Payload, Payloads};

/// Metadata key naming the payload encoding.
pub const ENCODING_METADATA_KEY: &str = "encoding";

/// Encoding marker of the default converter.
pub const JSON_ENCODING: &[u8] = b"json/plain";

#[derive(Debug, Error)]
pub enum ConverterError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON data converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataConverter;

impl DataConverter {
    /// Encode one value into a single payload.
    pub fn to_payload<T: Serialize>(&self, value: &T) -> Result<Payload, ConverterError> {
        let mut metadata = std::collections::HashMap::new();
        metadata.insert(ENCODING_METADATA_KEY.to_string(), JSON_ENCODING.to_vec());
        Ok(Payload {
            metadata,
            data: serde_json::to_vec(value)?,
        })
    }

    /// Encode one value into a single-element payload list.
    pub fn to_payloads<T: Serialize>(&self, value: &T) -> Result<Payloads, ConverterError> {
        Ok(Payloads {
            payloads: vec![self.to_payload(value)?],
        })
    }

    /// Decode one payload back into a value.
    pub fn from_payload<T: DeserializeOwned>(&self, payload: &Payload) -> Result<T, ConverterError> {
        Ok(serde_json::from_slice(&payload.data)?)
    }
}

/// Maps between wire-level failures and in-process workflow errors.
///
/// The mapping preserves failure identity: a failure that travels through
/// the bridge comes out the other side bit-identical, which is what lets
/// Temporal classify retryability correctly.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureConverter;

impl FailureConverter {
    pub fn failure_to_error(&self, failure: Failure) -> WorkflowError {
        WorkflowError::Failure(Box::new(failure))
    }

    pub fn error_to_failure(&self, error: &WorkflowError) -> Failure {
        match error {
            WorkflowError::Failure(failure) => failure.as_ref().clone(),
            WorkflowError::ContinueAsNew(params) => Failure {
                message: format!("continue as new: {}", params.workflow_type),
                source: "tembridge".to_string(),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_encoding_metadata() {
        let converter = DataConverter;
        let payload = converter.to_payload(&"completed").unwrap();
        assert_eq!(
            payload.metadata.get(ENCODING_METADATA_KEY).unwrap(),
            JSON_ENCODING
        );
        assert_eq!(payload.data, b"\"completed\"");
    }

    #[test]
    fn test_value_round_trip() {
        let converter = DataConverter;
        let payloads = converter.to_payloads(&42i32).unwrap();
        assert_eq!(payloads.payloads.len(), 1);
        let back: i32 = converter.from_payload(&payloads.payloads[0]).unwrap();
        assert_eq!(back, 42);
    }

    #[test]
    fn test_failure_identity_preserved() {
        let converter = FailureConverter;
        let failure = Failure {
            message: "user code exploded".into(),
            source: "php".into(),
            stack_trace: "#0 main".into(),
            ..Default::default()
        };
        let error = converter.failure_to_error(failure.clone());
        assert_eq!(converter.error_to_failure(&error), failure);
    }
}
