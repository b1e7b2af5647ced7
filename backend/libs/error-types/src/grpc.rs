//! gRPC codec
//!
//! Domain errors travel in `grpc-status-details-bin` as a `google.rpc.Status`
//! whose details list holds the error envelope.

use crate::base::BaseError;
use crate::envelope::{ErrorEnvelope, RpcStatus};
use crate::registry::DetailRegistry;
use crate::wire::{decode_envelope, WireError};
use crate::ServiceError;
use bytes::Bytes;
use prost::Message;
use tonic::{Code, Status};

/// Render a `WireError` as a tonic `Status`
pub fn encode(wire: &WireError) -> Status {
    let code: Code = wire.code.into();

    match &wire.envelope {
        None => Status::new(code, wire.message.clone()),
        Some(envelope) => {
            let rpc_status = RpcStatus {
                code: code as i32,
                message: wire.message.clone(),
                details: vec![envelope.to_any()],
            };
            Status::with_details(
                code,
                wire.message.clone(),
                Bytes::from(rpc_status.encode_to_vec()),
            )
        }
    }
}

/// Find the error envelope in a received status, if any
pub fn envelope_of(status: &Status) -> Option<ErrorEnvelope> {
    if status.details().is_empty() {
        return None;
    }

    let rpc_status = RpcStatus::decode(status.details())
        .map_err(|e| tracing::debug!(error = %e, "Status details are not google.rpc.Status"))
        .ok()?;

    rpc_status.details.iter().find_map(ErrorEnvelope::from_any)
}

/// Reconstruct a domain error; statuses without the envelope come back untouched
pub fn decode(status: Status) -> Result<BaseError, Status> {
    decode_with(status, DetailRegistry::standard())
}

pub fn decode_with(status: Status, registry: &DetailRegistry) -> Result<BaseError, Status> {
    match envelope_of(&status).and_then(|envelope| decode_envelope(&envelope, registry)) {
        Some(err) => Ok(err),
        None => Err(status),
    }
}

/// Transport-neutral view of a received status
pub fn to_wire(status: &Status) -> WireError {
    WireError {
        code: status.code().into(),
        message: status.message().to_string(),
        envelope: envelope_of(status),
    }
}

impl From<&ServiceError> for Status {
    fn from(err: &ServiceError) -> Self {
        encode(&WireError::from(err))
    }
}

impl From<ServiceError> for Status {
    fn from(err: ServiceError) -> Self {
        Status::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detail::{PricingOptionErrorDetail, QuoteFormErrorDetail};

    #[test]
    fn test_encode_without_envelope_has_no_details() {
        let status = encode(&WireError::new(crate::Code::NotFound, "quote q-1"));

        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "quote q-1");
        assert!(status.details().is_empty());
    }

    #[test]
    fn test_plain_status_passes_through_unmodified() {
        let status = Status::unavailable("connection reset by peer");

        let result = decode(status);

        let status = result.unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
        assert_eq!(status.message(), "connection reset by peer");
    }

    #[test]
    fn test_foreign_details_pass_through() {
        let rpc_status = RpcStatus {
            code: Code::InvalidArgument as i32,
            message: "bad".to_string(),
            details: vec![prost_types::Any {
                type_url: "type.googleapis.com/google.rpc.BadRequest".to_string(),
                value: vec![],
            }],
        };
        let status = Status::with_details(
            Code::InvalidArgument,
            "bad",
            Bytes::from(rpc_status.encode_to_vec()),
        );

        assert!(decode(status).is_err());
    }

    #[test]
    fn test_encode_uses_shared_table() {
        let err = BaseError::pricing_option_invalid_argument(PricingOptionErrorDetail::default());
        let status = encode(&WireError::from_base(&err));
        assert_eq!(status.code(), Code::InvalidArgument);

        let err = BaseError::invalid_quote(QuoteFormErrorDetail::default());
        let status: Status = ServiceError::from(err).into();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "quote form is invalid");
    }
}
