//! Transport-neutral rendering of errors
//!
//! Every outbound error is first reduced to a `WireError` by exactly one
//! function per source type; the gRPC and Connect encoders only change the
//! spelling. Inbound, both decoders hand the envelope they found back here.

use crate::base::BaseError;
use crate::code::Code;
use crate::envelope::ErrorEnvelope;
use crate::kind::ErrorKind;
use crate::registry::DetailRegistry;
use crate::ServiceError;
use tracing::warn;

/// Caller-visible message for internal failures
pub const GENERIC_INTERNAL_MESSAGE: &str = "internal error, try again later";

/// Caller-visible message for transient failures
pub const GENERIC_UNAVAILABLE_MESSAGE: &str = "service temporarily unavailable, try again later";

#[derive(Debug, Clone, PartialEq)]
pub struct WireError {
    pub code: Code,
    pub message: String,
    pub envelope: Option<ErrorEnvelope>,
}

impl WireError {
    /// Plain error without domain envelope
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            envelope: None,
        }
    }

    /// Domain error: shared status table, canonical message, envelope always attached
    pub fn from_base(err: &BaseError) -> Self {
        let kind = err.kind();
        Self {
            code: kind.status_code(),
            message: kind.wire_message().to_string(),
            envelope: Some(ErrorEnvelope {
                domain_error_id: kind.id(),
                details: err.detail().map(|detail| detail.to_any()),
            }),
        }
    }

    /// Rebuild the domain error if the envelope names a known kind
    pub fn to_base_error(&self) -> Option<BaseError> {
        self.envelope
            .as_ref()
            .and_then(|envelope| decode_envelope(envelope, DetailRegistry::standard()))
    }
}

impl From<&ServiceError> for WireError {
    fn from(err: &ServiceError) -> Self {
        match err {
            ServiceError::Domain(base) => WireError::from_base(base),
            ServiceError::NotFound(message) => WireError::new(Code::NotFound, message.clone()),
            ServiceError::AlreadyExists(message) => {
                WireError::new(Code::InvalidArgument, message.clone())
            }
            ServiceError::InvalidArgument(message) => {
                WireError::new(Code::InvalidArgument, message.clone())
            }
            ServiceError::Unauthenticated(message) => {
                WireError::new(Code::Unauthenticated, message.clone())
            }
            ServiceError::Unavailable(_) => {
                WireError::new(Code::Unavailable, GENERIC_UNAVAILABLE_MESSAGE)
            }
            ServiceError::Internal(_) => WireError::new(Code::Internal, GENERIC_INTERNAL_MESSAGE),
        }
    }
}

/// Envelope → domain error
///
/// Unknown ids are not ours to interpret and yield `None`. A known id whose
/// detail cannot be decoded still yields the kind, without detail.
pub fn decode_envelope(envelope: &ErrorEnvelope, registry: &DetailRegistry) -> Option<BaseError> {
    let Some(kind) = ErrorKind::from_id(envelope.domain_error_id) else {
        warn!(
            domain_error_id = envelope.domain_error_id,
            "Error envelope carries unknown domain error id"
        );
        return None;
    };

    let detail = envelope.details.as_ref().and_then(|any| {
        registry
            .decode(kind, any)
            .map_err(|e| warn!(kind = %kind, error = %e, "Dropping undecodable error detail"))
            .ok()
    });

    Some(BaseError::from_parts(kind, detail))
}
