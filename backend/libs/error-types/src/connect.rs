//! Connect protocol codec (browser transport)
//!
//! Connect errors are JSON: `{"code", "message", "details": [{"type", "value"}]}`
//! where `value` is the base64 (unpadded) protobuf encoding of the detail. The
//! envelope bytes are the same ones the gRPC codec ships.

use crate::base::BaseError;
use crate::code::Code;
use crate::envelope::{ErrorEnvelope, ENVELOPE_TYPE_NAME};
use crate::registry::DetailRegistry;
use crate::wire::{decode_envelope, WireError};
use crate::ServiceError;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use prost::Message;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct ConnectError {
    pub code: Code,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ConnectErrorDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectErrorDetail {
    /// Fully-qualified protobuf message name, without the type URL prefix
    #[serde(rename = "type")]
    pub type_name: String,
    /// Base64-encoded message bytes
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<serde_json::Value>,
}

impl ConnectError {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    pub fn to_json(&self) -> Vec<u8> {
        // Plain strings and enums only; serialization cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Render a `WireError` as a Connect error
pub fn encode(wire: &WireError) -> ConnectError {
    let details = wire
        .envelope
        .iter()
        .map(|envelope| ConnectErrorDetail {
            type_name: ENVELOPE_TYPE_NAME.to_string(),
            value: STANDARD_NO_PAD.encode(envelope.encode_to_vec()),
            debug: None,
        })
        .collect();

    ConnectError {
        code: wire.code,
        message: wire.message.clone(),
        details,
    }
}

/// Find the error envelope in a received Connect error, if any
pub fn envelope_of(err: &ConnectError) -> Option<ErrorEnvelope> {
    err.details
        .iter()
        .filter(|detail| detail.type_name == ENVELOPE_TYPE_NAME)
        .find_map(|detail| {
            // Senders may pad; accept both forms.
            let bytes = STANDARD_NO_PAD
                .decode(detail.value.trim_end_matches('='))
                .map_err(|e| tracing::warn!(error = %e, "Error envelope is not valid base64"))
                .ok()?;
            ErrorEnvelope::decode(bytes.as_slice())
                .map_err(|e| tracing::warn!(error = %e, "Malformed error envelope"))
                .ok()
        })
}

/// Reconstruct a domain error; errors without the envelope come back untouched
pub fn decode(err: ConnectError) -> Result<BaseError, ConnectError> {
    decode_with(err, DetailRegistry::standard())
}

pub fn decode_with(err: ConnectError, registry: &DetailRegistry) -> Result<BaseError, ConnectError> {
    match envelope_of(&err).and_then(|envelope| decode_envelope(&envelope, registry)) {
        Some(base) => Ok(base),
        None => Err(err),
    }
}

pub fn to_wire(err: &ConnectError) -> WireError {
    WireError {
        code: err.code,
        message: err.message.clone(),
        envelope: envelope_of(err),
    }
}

impl From<&ServiceError> for ConnectError {
    fn from(err: &ServiceError) -> Self {
        encode(&WireError::from(err))
    }
}
