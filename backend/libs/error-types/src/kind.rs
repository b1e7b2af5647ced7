//! Closed set of domain error kinds
//!
//! Every kind has a stable numeric id (the wire discriminant carried in the
//! error envelope), a canonical name and a declared detail schema. The
//! kind→code table below is the only place where kinds meet status codes and
//! is shared by every transport encoder.

use crate::code::Code;
use crate::detail::DetailSchema;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unspecified,
    MessageAlreadyExists,
    InvalidQuote,
    PricingOptionInvalidArgument,
    WebhookDeliveryFailed,
}

/// Kind → status code. Kinds without an entry map to `Code::Internal`.
const STATUS_CODES: &[(ErrorKind, Code)] = &[
    (ErrorKind::Unspecified, Code::Internal),
    (ErrorKind::MessageAlreadyExists, Code::AlreadyExists),
    (ErrorKind::InvalidQuote, Code::InvalidArgument),
    (ErrorKind::PricingOptionInvalidArgument, Code::InvalidArgument),
];

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::Unspecified,
        ErrorKind::MessageAlreadyExists,
        ErrorKind::InvalidQuote,
        ErrorKind::PricingOptionInvalidArgument,
        ErrorKind::WebhookDeliveryFailed,
    ];

    /// Wire discriminant
    pub fn id(&self) -> i32 {
        match self {
            ErrorKind::Unspecified => 0,
            ErrorKind::MessageAlreadyExists => 1,
            ErrorKind::InvalidQuote => 2,
            ErrorKind::PricingOptionInvalidArgument => 3,
            ErrorKind::WebhookDeliveryFailed => 4,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    pub fn canonical_name(&self) -> &'static str {
        match self {
            ErrorKind::Unspecified => "UNSPECIFIED",
            ErrorKind::MessageAlreadyExists => "MESSAGE_ALREADY_EXISTS",
            ErrorKind::InvalidQuote => "INVALID_QUOTE",
            ErrorKind::PricingOptionInvalidArgument => "PRICING_OPTION_INVALID_ARGUMENT",
            ErrorKind::WebhookDeliveryFailed => "WEBHOOK_DELIVERY_FAILED",
        }
    }

    /// Fixed user-facing message, when the kind has one
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            ErrorKind::MessageAlreadyExists => Some("message already exists"),
            ErrorKind::InvalidQuote => Some("quote form is invalid"),
            _ => None,
        }
    }

    /// Message rendered on the wire
    pub fn wire_message(&self) -> &'static str {
        self.user_message().unwrap_or_else(|| self.canonical_name())
    }

    /// Detail type this kind may carry, if any
    pub fn detail_schema(&self) -> Option<DetailSchema> {
        match self {
            ErrorKind::InvalidQuote => Some(DetailSchema::QuoteForm),
            ErrorKind::PricingOptionInvalidArgument => Some(DetailSchema::PricingOption),
            ErrorKind::Unspecified
            | ErrorKind::MessageAlreadyExists
            | ErrorKind::WebhookDeliveryFailed => None,
        }
    }

    pub fn status_code(&self) -> Code {
        STATUS_CODES
            .iter()
            .find(|(kind, _)| kind == self)
            .map(|(_, code)| *code)
            .unwrap_or(Code::Internal)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}
