//! Explicit request-scoped context
//!
//! Transports create a `CallContext` when a call arrives, the authenticator
//! derives a child context carrying the identity, and handlers receive it by
//! value. Cancellation follows Rust future semantics: anything awaited through
//! the context is dropped together with the call future, and `bounded` adds
//! the call deadline on top.

use crate::identity::{Identity, Principal};
use std::fmt;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("call deadline exceeded")]
    DeadlineExceeded,
}

/// Correlation ID propagated across service boundaries
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Reuse a caller-supplied id; blank values get a fresh one
    pub fn from_header(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            Self::generate()
        } else {
            Self(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Context of a single call
///
/// Cheap to clone: the identity is shared behind an `Arc` and never mutated.
#[derive(Debug, Clone)]
pub struct CallContext {
    procedure: String,
    peer: IpAddr,
    deadline: Option<Instant>,
    correlation_id: CorrelationId,
    identity: Option<Arc<Identity>>,
}

impl CallContext {
    /// Fresh, unauthenticated context for the given procedure path
    pub fn new(procedure: impl Into<String>) -> Self {
        Self {
            procedure: procedure.into(),
            peer: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            deadline: None,
            correlation_id: CorrelationId::generate(),
            identity: None,
        }
    }

    pub fn with_peer(mut self, peer: IpAddr) -> Self {
        self.peer = peer;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Some(Instant::now() + timeout))
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Child context carrying a verified identity
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(Arc::new(identity));
        self
    }

    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    pub fn peer(&self) -> IpAddr {
        self.peer
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_deref()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.identity().map(Identity::principal)
    }

    /// Time left before the deadline; `Some(ZERO)` once it has passed
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Run `fut` no longer than the call deadline allows
    ///
    /// Without a deadline the future runs to completion (or until the call
    /// future that awaits it is dropped).
    pub async fn bounded<F>(&self, fut: F) -> Result<F::Output, ContextError>
    where
        F: Future,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| ContextError::DeadlineExceeded),
            None => Ok(fut.await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::TrustSource;

    #[test]
    fn test_new_context_is_anonymous() {
        let ctx = CallContext::new("/switchboard.quotes.v1.QuoteService/CreateQuote");

        assert!(ctx.identity().is_none());
        assert!(ctx.principal().is_none());
        assert_eq!(ctx.peer().to_string(), "0.0.0.0");
        assert_eq!(ctx.procedure(), "/switchboard.quotes.v1.QuoteService/CreateQuote");
    }

    #[test]
    fn test_with_identity_derives_child() {
        let parent = CallContext::new("/svc/Method");
        let child = parent.clone().with_identity(Identity::new(
            Principal::new("user-1"),
            "token",
            TrustSource::StaticSecret,
        ));

        assert!(parent.identity().is_none());
        assert_eq!(child.principal().map(Principal::as_str), Some("user-1"));
        assert_eq!(child.correlation_id(), parent.correlation_id());
    }

    #[test]
    fn test_correlation_id_from_blank_header_generates() {
        let id = CorrelationId::from_header("   ");
        assert_eq!(id.as_str().len(), 36);

        let id = CorrelationId::from_header("req-123");
        assert_eq!(id.as_str(), "req-123");
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_respects_deadline() {
        let ctx = CallContext::new("/svc/Method").with_timeout(Duration::from_millis(50));

        let result = ctx
            .bounded(tokio::time::sleep(Duration::from_secs(5)))
            .await;

        assert_eq!(result, Err(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_bounded_without_deadline_completes() {
        let ctx = CallContext::new("/svc/Method");
        let result = ctx.bounded(async { 7 }).await;
        assert_eq!(result, Ok(7));
        assert!(ctx.remaining().is_none());
    }
}
