//! Structured error details
//!
//! Details are protobuf messages so they travel as `google.protobuf.Any`:
//! a receiver that does not share this crate still sees the type URL and knows
//! the error carries domain detail, even if it cannot decode the bytes.

use prost::Message;
use prost_types::Any;

pub const QUOTE_FORM_DETAIL_TYPE_URL: &str =
    "type.googleapis.com/switchboard.errors.v1.QuoteFormErrorDetail";
pub const PRICING_OPTION_DETAIL_TYPE_URL: &str =
    "type.googleapis.com/switchboard.errors.v1.PricingOptionErrorDetail";

#[derive(Clone, PartialEq, Message)]
pub struct FieldViolation {
    #[prost(string, tag = "1")]
    pub field: String,
    #[prost(string, tag = "2")]
    pub description: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            description: description.into(),
        }
    }
}

/// Why a submitted quote form was rejected
#[derive(Clone, PartialEq, Message)]
pub struct QuoteFormErrorDetail {
    #[prost(string, tag = "1")]
    pub quote_id: String,
    #[prost(message, repeated, tag = "2")]
    pub field_violations: Vec<FieldViolation>,
}

/// Why a pricing option argument was rejected
#[derive(Clone, PartialEq, Message)]
pub struct PricingOptionErrorDetail {
    #[prost(string, tag = "1")]
    pub pricing_option_id: String,
    #[prost(string, tag = "2")]
    pub reason: String,
    #[prost(message, repeated, tag = "3")]
    pub field_violations: Vec<FieldViolation>,
}

/// Identifies a detail message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailSchema {
    QuoteForm,
    PricingOption,
}

impl DetailSchema {
    pub fn type_url(&self) -> &'static str {
        match self {
            DetailSchema::QuoteForm => QUOTE_FORM_DETAIL_TYPE_URL,
            DetailSchema::PricingOption => PRICING_OPTION_DETAIL_TYPE_URL,
        }
    }

    pub(crate) fn decode(&self, bytes: &[u8]) -> Result<ErrorDetail, prost::DecodeError> {
        match self {
            DetailSchema::QuoteForm => QuoteFormErrorDetail::decode(bytes).map(ErrorDetail::QuoteForm),
            DetailSchema::PricingOption => {
                PricingOptionErrorDetail::decode(bytes).map(ErrorDetail::PricingOption)
            }
        }
    }
}

/// Detail payload attached to a `BaseError`
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
    QuoteForm(QuoteFormErrorDetail),
    PricingOption(PricingOptionErrorDetail),
}

impl ErrorDetail {
    pub fn schema(&self) -> DetailSchema {
        match self {
            ErrorDetail::QuoteForm(_) => DetailSchema::QuoteForm,
            ErrorDetail::PricingOption(_) => DetailSchema::PricingOption,
        }
    }

    /// Self-describing wire form
    pub fn to_any(&self) -> Any {
        let value = match self {
            ErrorDetail::QuoteForm(detail) => detail.encode_to_vec(),
            ErrorDetail::PricingOption(detail) => detail.encode_to_vec(),
        };

        Any {
            type_url: self.schema().type_url().to_string(),
            value,
        }
    }
}

impl From<QuoteFormErrorDetail> for ErrorDetail {
    fn from(detail: QuoteFormErrorDetail) -> Self {
        ErrorDetail::QuoteForm(detail)
    }
}

impl From<PricingOptionErrorDetail> for ErrorDetail {
    fn from(detail: PricingOptionErrorDetail) -> Self {
        ErrorDetail::PricingOption(detail)
    }
}
