//! Header names and parsing shared by both transports

use http::HeaderMap;
use request_context::{CallContext, CorrelationId};
use std::time::Duration;
use tokio::time::Instant;

/// Correlation id propagated between services
pub const CORRELATION_ID_KEY: &str = "correlation-id";

/// gRPC deadline header (`<digits><unit>`)
pub const GRPC_TIMEOUT: &str = "grpc-timeout";

/// Connect deadline header (milliseconds)
pub const CONNECT_TIMEOUT_MS: &str = "connect-timeout-ms";

/// Parse a `grpc-timeout` value: at most 8 digits followed by H, M, S, m, u or n
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || !value.is_ascii() {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;
    let timeout = match unit {
        "H" => Duration::from_secs(amount * 60 * 60),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(timeout)
}

/// Parse a `connect-timeout-ms` value: at most 10 digits
pub fn parse_connect_timeout(value: &str) -> Option<Duration> {
    if value.is_empty() || value.len() > 10 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok().map(Duration::from_millis)
}

/// Context every inbound call starts from: deadline and correlation id
///
/// The authenticator derives the call's real context (peer, identity) from it.
pub(crate) fn parent_context(
    procedure: &str,
    headers: &HeaderMap,
    timeout_header: &str,
    parse_timeout: fn(&str) -> Option<Duration>,
) -> CallContext {
    let deadline = headers
        .get(timeout_header)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_timeout)
        .map(|timeout| Instant::now() + timeout);
    let correlation_id = headers
        .get(CORRELATION_ID_KEY)
        .and_then(|v| v.to_str().ok())
        .map(CorrelationId::from_header)
        .unwrap_or_else(CorrelationId::generate);

    CallContext::new(procedure)
        .with_deadline(deadline)
        .with_correlation_id(correlation_id)
}
