use error_types::connect::ConnectError;
use error_types::{connect, grpc, BaseError, Code};
use thiserror::Error;
use tonic::Status;

/// Failure of an outbound call, as seen by the calling handler
///
/// `Domain` is only produced when the remote attached the error envelope;
/// everything else is passed through unmodified.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Domain(BaseError),

    #[error("gRPC call failed: {0}")]
    Grpc(Status),

    #[error("Connect call failed: {0}")]
    Connect(ConnectError),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("invalid outbound metadata: {0}")]
    Metadata(String),
}

impl ClientError {
    pub fn from_status(status: Status) -> Self {
        match grpc::decode(status) {
            Ok(base) => ClientError::Domain(base),
            Err(status) => ClientError::Grpc(status),
        }
    }

    pub fn from_connect(err: ConnectError) -> Self {
        match connect::decode(err) {
            Ok(base) => ClientError::Domain(base),
            Err(err) => ClientError::Connect(err),
        }
    }

    pub fn domain(&self) -> Option<&BaseError> {
        match self {
            ClientError::Domain(base) => Some(base),
            _ => None,
        }
    }

    pub fn code(&self) -> Code {
        match self {
            ClientError::Domain(base) => base.kind().status_code(),
            ClientError::Grpc(status) => status.code().into(),
            ClientError::Connect(err) => err.code,
            ClientError::Http(err) if err.is_timeout() => Code::DeadlineExceeded,
            ClientError::Http(err) if err.is_connect() => Code::Unavailable,
            ClientError::Http(_) | ClientError::Protocol(_) => Code::Unknown,
            ClientError::Metadata(_) => Code::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use error_types::{PricingOptionErrorDetail, WireError};

    #[test]
    fn test_status_with_envelope_becomes_domain_error() {
        let base = BaseError::pricing_option_invalid_argument(PricingOptionErrorDetail {
            pricing_option_id: "po-7".to_string(),
            reason: "currency mismatch".to_string(),
            field_violations: vec![],
        });
        let status = grpc::encode(&WireError::from_base(&base));

        let err = ClientError::from_status(status);

        assert_eq!(err.domain(), Some(&base));
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[test]
    fn test_plain_status_passes_through() {
        let err = ClientError::from_status(Status::unavailable("connection reset"));

        match err {
            ClientError::Grpc(status) => {
                assert_eq!(status.code(), tonic::Code::Unavailable);
                assert_eq!(status.message(), "connection reset");
            }
            other => panic!("expected pass-through, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_connect_error_passes_through() {
        let err = ClientError::from_connect(ConnectError::new(Code::NotFound, "no such quote"));
        assert!(err.domain().is_none());
        assert_eq!(err.code(), Code::NotFound);
    }
}
