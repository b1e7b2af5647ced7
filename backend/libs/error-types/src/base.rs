//! Domain error value returned by handler logic

use crate::detail::{ErrorDetail, PricingOptionErrorDetail, QuoteFormErrorDetail};
use crate::kind::ErrorKind;
use thiserror::Error;

/// `{kind, optional detail}`
///
/// Invariant: a present detail always matches the kind's declared schema.
/// Typed constructors make a mismatch unrepresentable; `with_detail` checks it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct BaseError {
    kind: ErrorKind,
    detail: Option<ErrorDetail>,
}

impl BaseError {
    /// Error without detail; legal for every kind
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, detail: None }
    }

    /// # Panics
    ///
    /// Panics if `detail` is not the schema declared by `kind`. Attaching the
    /// wrong detail is a programming error, not a runtime condition.
    pub fn with_detail(kind: ErrorKind, detail: impl Into<ErrorDetail>) -> Self {
        let detail = detail.into();
        assert_eq!(
            kind.detail_schema(),
            Some(detail.schema()),
            "{kind} cannot carry {:?} detail",
            detail.schema()
        );
        Self {
            kind,
            detail: Some(detail),
        }
    }

    pub fn internal() -> Self {
        Self::new(ErrorKind::Unspecified)
    }

    pub fn message_already_exists() -> Self {
        Self::new(ErrorKind::MessageAlreadyExists)
    }

    pub fn invalid_quote(detail: QuoteFormErrorDetail) -> Self {
        Self {
            kind: ErrorKind::InvalidQuote,
            detail: Some(ErrorDetail::QuoteForm(detail)),
        }
    }

    pub fn pricing_option_invalid_argument(detail: PricingOptionErrorDetail) -> Self {
        Self {
            kind: ErrorKind::PricingOptionInvalidArgument,
            detail: Some(ErrorDetail::PricingOption(detail)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn detail(&self) -> Option<&ErrorDetail> {
        self.detail.as_ref()
    }

    // Used by the decoder, which has already checked the schema via the registry.
    pub(crate) fn from_parts(kind: ErrorKind, detail: Option<ErrorDetail>) -> Self {
        Self { kind, detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_detail_accepts_declared_schema() {
        let err = BaseError::with_detail(ErrorKind::InvalidQuote, QuoteFormErrorDetail::default());
        assert_eq!(err.kind(), ErrorKind::InvalidQuote);
        assert!(err.detail().is_some());
    }

    #[test]
    #[should_panic(expected = "cannot carry")]
    fn test_with_detail_rejects_wrong_schema() {
        BaseError::with_detail(ErrorKind::InvalidQuote, PricingOptionErrorDetail::default());
    }

    #[test]
    #[should_panic(expected = "cannot carry")]
    fn test_with_detail_rejects_detailless_kind() {
        BaseError::with_detail(ErrorKind::MessageAlreadyExists, QuoteFormErrorDetail::default());
    }

    #[test]
    fn test_display_is_canonical_name() {
        assert_eq!(BaseError::message_already_exists().to_string(), "MESSAGE_ALREADY_EXISTS");
    }
}
