//! gRPC client side: identity propagation, tracing metadata, error decoding

use crate::error::ClientError;
use crate::metadata::CORRELATION_ID_KEY;
use futures::Stream;
use pin_project::pin_project;
use request_context::{CallContext, CorrelationId, Principal};
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::time::Instant;
use tonic::metadata::AsciiMetadataValue;
use tonic::service::Interceptor;
use tonic::{Request, Response, Status};
use tracing::debug;

/// Attaches the caller's credential to outgoing calls
///
/// Built from the inbound `CallContext`, so a nested call carries the same
/// identity the current call was authenticated with.
#[derive(Clone, Default)]
pub struct IdentityInterceptor {
    authorization: Option<AsciiMetadataValue>,
    principal: Option<Principal>,
}

impl IdentityInterceptor {
    /// Re-attach the identity of `ctx`; anonymous contexts send no credential
    pub fn from_context(ctx: &CallContext) -> Result<Self, ClientError> {
        match ctx.identity() {
            Some(identity) => Ok(Self {
                authorization: Some(bearer_value(identity.credential())?),
                principal: Some(identity.principal().clone()),
            }),
            None => Ok(Self::default()),
        }
    }

    /// Use a service credential minted by this process
    pub fn with_token(token: &str, principal: Principal) -> Result<Self, ClientError> {
        Ok(Self {
            authorization: Some(bearer_value(token)?),
            principal: Some(principal),
        })
    }
}

fn bearer_value(token: &str) -> Result<AsciiMetadataValue, ClientError> {
    AsciiMetadataValue::try_from(format!("Bearer {token}"))
        .map_err(|_| ClientError::Metadata("credential is not valid ASCII metadata".to_string()))
}

impl Interceptor for IdentityInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if let Some(authorization) = &self.authorization {
            request
                .metadata_mut()
                .insert("authorization", authorization.clone());
        }
        if let Some(principal) = &self.principal {
            request.extensions_mut().insert(principal.clone());
        }
        Ok(request)
    }
}

/// What the tracing interceptor recorded for an outbound call
///
/// Stored in the request extensions for lower layers (metrics, transport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCall {
    pub correlation_id: CorrelationId,
    pub principal: Option<Principal>,
}

/// Propagates correlation id and remaining deadline
///
/// Runs after `IdentityInterceptor` so it can tag the call with the principal.
#[derive(Clone)]
pub struct TracingInterceptor {
    correlation_id: CorrelationId,
    deadline: Option<Instant>,
}

impl TracingInterceptor {
    pub fn from_context(ctx: &CallContext) -> Self {
        Self {
            correlation_id: ctx.correlation_id().clone(),
            deadline: ctx.deadline(),
        }
    }
}

impl Interceptor for TracingInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if let Some(deadline) = self.deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Status::deadline_exceeded("deadline exceeded before the call started"));
            }
            request.set_timeout(remaining);
        }

        if let Ok(value) = AsciiMetadataValue::try_from(self.correlation_id.as_str()) {
            request.metadata_mut().insert(CORRELATION_ID_KEY, value);
        }

        let principal = request.extensions().get::<Principal>().cloned();
        debug!(
            correlation_id = %self.correlation_id,
            principal = %principal.as_ref().map(Principal::as_str).unwrap_or("anonymous"),
            "Outbound gRPC call"
        );
        request.extensions_mut().insert(OutboundCall {
            correlation_id: self.correlation_id.clone(),
            principal,
        });
        Ok(request)
    }
}

/// Identity first, then tracing
///
/// ```rust,ignore
/// let chain = ClientChain::for_call(&ctx)?;
/// let mut client = PricingServiceClient::with_interceptor(channel, chain);
/// let reply = call_unary(client.get_price(request)).await?;
/// ```
#[derive(Clone)]
pub struct ClientChain {
    identity: IdentityInterceptor,
    tracing: TracingInterceptor,
}

impl ClientChain {
    pub fn new(identity: IdentityInterceptor, tracing: TracingInterceptor) -> Self {
        Self { identity, tracing }
    }

    /// Chain for a nested call made while serving `ctx`
    pub fn for_call(ctx: &CallContext) -> Result<Self, ClientError> {
        Ok(Self::new(
            IdentityInterceptor::from_context(ctx)?,
            TracingInterceptor::from_context(ctx),
        ))
    }
}

impl Interceptor for ClientChain {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        let request = self.identity.call(request)?;
        self.tracing.call(request)
    }
}

/// Await a unary (or client-streaming) call, decoding domain errors
pub async fn call_unary<R, Fut>(call: Fut) -> Result<R, ClientError>
where
    Fut: Future<Output = Result<Response<R>, Status>>,
{
    call.await
        .map(Response::into_inner)
        .map_err(ClientError::from_status)
}

/// Await the opening of a server-streaming call, decoding domain errors on
/// the opening status and on the stream's terminal status
pub async fn call_streaming<S, M, Fut>(call: Fut) -> Result<DomainStream<S>, ClientError>
where
    Fut: Future<Output = Result<Response<S>, Status>>,
    S: Stream<Item = Result<M, Status>>,
{
    call.await
        .map(|response| DomainStream::new(response.into_inner()))
        .map_err(ClientError::from_status)
}

/// Message stream whose errors are decoded into `ClientError`
#[pin_project]
pub struct DomainStream<S> {
    #[pin]
    inner: S,
}

impl<S> DomainStream<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S, M> Stream for DomainStream<S>
where
    S: Stream<Item = Result<M, Status>>,
{
    type Item = Result<M, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let item = ready!(self.project().inner.poll_next(cx));
        Poll::Ready(item.map(|result| result.map_err(ClientError::from_status)))
    }
}
