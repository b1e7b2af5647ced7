use crate::algorithm::SigningAlgorithm;
use crate::config::Environment;
use thiserror::Error;

/// Failure reported by the remote key service
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyServiceError {
    #[error("key service unreachable: {0}")]
    Unreachable(String),

    #[error("key service rejected the request: {0}")]
    Rejected(String),

    #[error("key service internal fault: {0}")]
    Internal(String),

    #[error("unclassified key service fault: {0}")]
    Unknown(String),

    #[error("key service does not support {0}")]
    Unsupported(SigningAlgorithm),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("static secret keys are test-only; refusing to use one in {environment}")]
    StaticKeyOutsideTests { environment: Environment },

    #[error("{provider} provider cannot verify credentials")]
    VerifierUnavailable { provider: &'static str },

    #[error("invalid key configuration: {0}")]
    Misconfigured(String),

    #[error("key service call exceeded the call deadline")]
    DeadlineExceeded,

    #[error(transparent)]
    Service(#[from] KeyServiceError),
}
