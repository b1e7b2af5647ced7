//! Server-side error remapping shared by both transports
//!
//! Handlers return `ServiceError`; the handler boundary of each transport
//! logs the failure once, with the caller's identity, and renders it through
//! the error-types codec. Nothing in between touches the error.

use error_types::{Code, ServiceError, WireError};
use request_context::CallContext;

/// Log a handler failure and reduce it to its wire form
pub(crate) fn remap(ctx: &CallContext, err: &ServiceError) -> WireError {
    let wire = WireError::from(err);
    let principal = ctx.principal().map(|p| p.as_str()).unwrap_or("anonymous");

    match wire.code {
        Code::InvalidArgument | Code::NotFound | Code::AlreadyExists => {
            tracing::debug!(
                procedure = %ctx.procedure(),
                principal = %principal,
                code = %wire.code,
                error = %err,
                "Client error"
            );
        }
        Code::Unauthenticated | Code::PermissionDenied => {
            tracing::warn!(
                procedure = %ctx.procedure(),
                principal = %principal,
                code = %wire.code,
                error = %err,
                "Auth error"
            );
        }
        Code::Internal | Code::Unknown | Code::Unavailable => {
            // Full detail stays here; the caller gets the generic message.
            tracing::error!(
                procedure = %ctx.procedure(),
                principal = %principal,
                peer = %ctx.peer(),
                correlation_id = %ctx.correlation_id(),
                code = %wire.code,
                error = ?err,
                "Internal error"
            );
        }
        _ => {
            tracing::info!(
                procedure = %ctx.procedure(),
                principal = %principal,
                code = %wire.code,
                error = %err,
                "Service error"
            );
        }
    }

    wire
}

/// Wire form of a call that outlived its deadline
pub(crate) fn deadline_exceeded(ctx: &CallContext) -> WireError {
    tracing::warn!(
        procedure = %ctx.procedure(),
        principal = %ctx.principal().map(|p| p.as_str()).unwrap_or("anonymous"),
        "Call deadline exceeded"
    );
    WireError::new(Code::DeadlineExceeded, "deadline exceeded")
}

#[cfg(test)]
mod tests {
    use super::*;
    use error_types::{BaseError, GENERIC_INTERNAL_MESSAGE};

    #[test]
    fn test_remap_hides_internal_detail() {
        let ctx = CallContext::new("/svc/Method");
        let err = ServiceError::Internal(anyhow::anyhow!("connection pool exhausted"));

        let wire = remap(&ctx, &err);

        assert_eq!(wire.code, Code::Internal);
        assert_eq!(wire.message, GENERIC_INTERNAL_MESSAGE);
    }

    #[test]
    fn test_remap_keeps_domain_envelope() {
        let ctx = CallContext::new("/svc/Method");
        let wire = remap(&ctx, &ServiceError::from(BaseError::message_already_exists()));

        assert_eq!(wire.code, Code::AlreadyExists);
        assert!(wire.envelope.is_some());
    }
}
