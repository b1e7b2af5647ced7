use error_types::{Code, WireError};
use signing_keys::{KeyError, KeyServiceError, TokenError};
use thiserror::Error;

/// Caller-visible message for every authentication-service failure
pub const AUTH_SERVICE_ERROR_MESSAGE: &str = "authentication service error, try again later";

/// Who is responsible for an authentication failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Credential absent, malformed or rejected by policy. Message is shown as-is.
    Caller,
    /// Key service or provider fault. Logged, never shown.
    Service,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingCredential,

    #[error("malformed authorization header: {0}")]
    MalformedHeader(String),

    #[error("invalid credential: {0}")]
    InvalidCredential(TokenError),

    #[error("authentication service failure: {0}")]
    Service(KeyError),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Key(key) => AuthError::Service(key),
            other => AuthError::InvalidCredential(other),
        }
    }
}

impl From<KeyError> for AuthError {
    fn from(err: KeyError) -> Self {
        AuthError::Service(err)
    }
}

impl AuthError {
    pub fn class(&self) -> FailureClass {
        match self {
            AuthError::Service(_) => FailureClass::Service,
            _ => FailureClass::Caller,
        }
    }

    pub fn code(&self) -> Code {
        match self {
            AuthError::MissingCredential => Code::Unauthenticated,
            AuthError::MalformedHeader(_) => Code::InvalidArgument,
            AuthError::InvalidCredential(TokenError::Malformed(_)) => Code::InvalidArgument,
            AuthError::InvalidCredential(_) => Code::Unauthenticated,
            AuthError::Service(KeyError::DeadlineExceeded)
            | AuthError::Service(KeyError::Service(KeyServiceError::Unreachable(_))) => {
                Code::Unavailable
            }
            AuthError::Service(_) => Code::Internal,
        }
    }

    /// What the caller is told
    pub fn caller_message(&self) -> String {
        match self.class() {
            FailureClass::Caller => self.to_string(),
            FailureClass::Service => AUTH_SERVICE_ERROR_MESSAGE.to_string(),
        }
    }

    /// Transport-neutral rendering; never carries a domain envelope
    pub fn to_wire(&self) -> WireError {
        WireError::new(self.code(), self.caller_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_failures_keep_their_message() {
        let err = AuthError::MalformedHeader("expected `Bearer <token>`".to_string());
        let wire = err.to_wire();
        assert_eq!(wire.code, Code::InvalidArgument);
        assert_eq!(
            wire.message,
            "malformed authorization header: expected `Bearer <token>`"
        );
        assert!(wire.envelope.is_none());

        let err = AuthError::from(TokenError::Expired);
        assert_eq!(err.code(), Code::Unauthenticated);
        assert_eq!(err.caller_message(), "invalid credential: token has expired");
    }

    #[test]
    fn test_service_failures_are_masked() {
        let internal = "kms endpoint 10.1.2.3 refused connection";
        let err = AuthError::from(TokenError::Key(KeyError::Service(
            KeyServiceError::Unreachable(internal.to_string()),
        )));

        assert_eq!(err.class(), FailureClass::Service);
        assert_eq!(err.code(), Code::Unavailable);
        assert_eq!(err.caller_message(), AUTH_SERVICE_ERROR_MESSAGE);
        assert!(err.to_string().contains(internal));
        assert!(!err.caller_message().contains(internal));
    }

    #[test]
    fn test_service_failure_codes() {
        assert_eq!(
            AuthError::Service(KeyError::DeadlineExceeded).code(),
            Code::Unavailable
        );
        assert_eq!(
            AuthError::Service(KeyError::Service(KeyServiceError::Internal("boom".into()))).code(),
            Code::Internal
        );
        assert_eq!(
            AuthError::Service(KeyError::Service(KeyServiceError::Unknown("?".into()))).code(),
            Code::Internal
        );
        assert_eq!(
            AuthError::Service(KeyError::VerifierUnavailable {
                provider: "static-secret"
            })
            .code(),
            Code::Internal
        );
    }

    #[test]
    fn test_malformed_token_is_invalid_argument() {
        let err = AuthError::from(TokenError::Malformed("bad segment".to_string()));
        assert_eq!(err.code(), Code::InvalidArgument);
        assert_eq!(err.class(), FailureClass::Caller);
    }
}
