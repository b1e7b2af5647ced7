//! Domain error taxonomy and its cross-protocol codec
//!
//! Handler logic returns errors by value; exactly one boundary per call
//! direction turns them into wire form (or back).
//!
//! ## Core Components
//!
//! - **ErrorKind**: closed set of domain error kinds with wire ids and the
//!   shared kind→code table
//! - **BaseError**: `{kind, optional detail}` constructed at the failure site
//! - **ServiceError**: what handlers return; domain errors plus datastore
//!   sentinels and transient/internal failures
//! - **WireError**: transport-neutral rendering consumed by both encoders
//! - **grpc / connect**: encode to and decode from tonic `Status` and Connect JSON
//!
//! ## Wire envelope
//!
//! Every domain error carries `{domain_error_id, details?: Any}`, so a
//! receiver with no shared code can still tell a domain failure from a plain
//! transport failure.

use thiserror::Error;

mod base;
mod code;
mod detail;
mod envelope;
mod kind;
mod registry;
mod wire;

pub mod connect;
pub mod grpc;

pub use base::BaseError;
pub use code::Code;
pub use detail::{
    DetailSchema, ErrorDetail, FieldViolation, PricingOptionErrorDetail, QuoteFormErrorDetail,
    PRICING_OPTION_DETAIL_TYPE_URL, QUOTE_FORM_DETAIL_TYPE_URL,
};
pub use envelope::{ErrorEnvelope, RpcStatus, ENVELOPE_TYPE_NAME, ENVELOPE_TYPE_URL};
pub use kind::ErrorKind;
pub use registry::{DetailDecodeError, DetailRegistry, RegistryError};
pub use wire::{decode_envelope, WireError, GENERIC_INTERNAL_MESSAGE, GENERIC_UNAVAILABLE_MESSAGE};

/// Result type alias for handler code
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Error returned by service handlers
///
/// Intermediate layers forward it untouched; the transport boundary renders it.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Domain failure with optional structured detail
    #[error(transparent)]
    Domain(#[from] BaseError),

    /// Datastore "not found" sentinel
    #[error("not found: {0}")]
    NotFound(String),

    /// Datastore "already exists" sentinel (rendered as InvalidArgument)
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Transient failure; caller sees a generic retry message
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Internal failure; caller sees a generic retry message
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn code(&self) -> Code {
        WireError::from(self).code
    }

    /// Failures the caller cannot fix by changing the request
    pub fn is_server_fault(&self) -> bool {
        matches!(self.code(), Code::Internal | Code::Unavailable | Code::Unknown)
    }
}
