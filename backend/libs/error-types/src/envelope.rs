//! Well-known error envelope
//!
//! `{domain_error_id, details?}` wrapped in `google.protobuf.Any`. The same
//! encoded bytes ride in gRPC `grpc-status-details-bin` and in the `details`
//! array of a Connect error.

use prost::Message;
use prost_types::Any;

pub const ENVELOPE_TYPE_NAME: &str = "switchboard.errors.v1.ErrorEnvelope";
pub const ENVELOPE_TYPE_URL: &str = "type.googleapis.com/switchboard.errors.v1.ErrorEnvelope";

#[derive(Clone, PartialEq, Message)]
pub struct ErrorEnvelope {
    #[prost(int32, tag = "1")]
    pub domain_error_id: i32,
    #[prost(message, optional, tag = "2")]
    pub details: Option<Any>,
}

impl ErrorEnvelope {
    pub fn to_any(&self) -> Any {
        Any {
            type_url: ENVELOPE_TYPE_URL.to_string(),
            value: self.encode_to_vec(),
        }
    }

    /// Decode if `any` is an envelope; other detail types yield `None`
    pub fn from_any(any: &Any) -> Option<Self> {
        if any.type_url != ENVELOPE_TYPE_URL {
            return None;
        }
        match Self::decode(any.value.as_slice()) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                tracing::warn!(error = %e, "Malformed error envelope");
                None
            }
        }
    }
}

/// `google.rpc.Status`, the payload of `grpc-status-details-bin`
#[derive(Clone, PartialEq, Message)]
pub struct RpcStatus {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, repeated, tag = "3")]
    pub details: Vec<Any>,
}
