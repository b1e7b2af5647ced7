//! gRPC server side: authentication layer and handler boundary

use crate::metadata::{parent_context, parse_grpc_timeout, GRPC_TIMEOUT};
use crate::remap::{deadline_exceeded, remap};
use error_types::{grpc, ServiceError, WireError};
use futures::Stream;
use pin_project::pin_project;
use request_auth::Authenticator;
use request_context::CallContext;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::time::Sleep;
use tonic::body::BoxBody;
use tonic::transport::server::TcpConnectInfo;
use tonic::{Request, Response, Status};
use tower::{Layer, Service};
use tracing::Instrument;

/// Authenticates every inbound call before tonic routes it
///
/// Runs at the HTTP level, so a streaming call is authenticated exactly once,
/// when the stream is opened. On success the derived `CallContext` is stored
/// in the request extensions (read it with `CallContextExt`); on failure the
/// call is answered with a status and the service is never invoked.
///
/// ```rust,ignore
/// Server::builder()
///     .layer(AuthLayer::new(authenticator))
///     .add_service(QuoteServiceServer::new(quotes))
///     .serve(addr)
///     .await?;
/// ```
#[derive(Clone)]
pub struct AuthLayer {
    authenticator: Authenticator,
}

impl AuthLayer {
    pub fn new(authenticator: Authenticator) -> Self {
        Self { authenticator }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, service: S) -> Self::Service {
        AuthService {
            inner: service,
            authenticator: self.authenticator.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    authenticator: Authenticator,
}

impl<S, B> Service<http::Request<B>> for AuthService<S>
where
    S: Service<http::Request<B>, Response = http::Response<BoxBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    B: Send + 'static,
{
    type Response = http::Response<BoxBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        // The clone may not be ready; call the instance that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let authenticator = self.authenticator.clone();

        let procedure = req.uri().path().to_string();
        let parent = parent_context(&procedure, req.headers(), GRPC_TIMEOUT, parse_grpc_timeout);
        let span = tracing::info_span!(
            "grpc_request",
            rpc.method = %procedure,
            correlation_id = %parent.correlation_id(),
        );

        Box::pin(
            async move {
                // Only the parts are borrowed across the await; the body just moves.
                let (mut parts, body) = req.into_parts();
                let remote_addr = parts
                    .extensions
                    .get::<TcpConnectInfo>()
                    .and_then(|info| info.remote_addr())
                    .map(|addr| addr.to_string());

                let authenticated = authenticator
                    .authenticate(&parent, &procedure, &parts.headers, remote_addr.as_deref())
                    .await;

                match authenticated {
                    Ok(ctx) => {
                        parts.extensions.insert(ctx);
                        inner.call(http::Request::from_parts(parts, body)).await
                    }
                    Err(err) => Ok(status_response(grpc::encode(&err.to_wire()))),
                }
            }
            .instrument(span),
        )
    }
}

/// Trailers-only response carrying `status`
fn status_response(status: Status) -> http::Response<BoxBody> {
    let mut response = http::Response::new(tonic::body::empty_body());
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/grpc"),
    );
    if let Err(unencodable) = status.add_header(response.headers_mut()) {
        tracing::error!(error = %unencodable, "Failed to encode status headers");
    }
    response
}

fn call_context<T>(request: &Request<T>) -> Result<CallContext, Status> {
    request.extensions().get::<CallContext>().cloned().ok_or_else(|| {
        tracing::error!("Call context missing; is AuthLayer installed?");
        Status::internal(error_types::GENERIC_INTERNAL_MESSAGE)
    })
}

fn to_status(wire: &WireError) -> Status {
    grpc::encode(wire)
}

/// Handler boundary for unary and client-streaming calls
///
/// The handler receives the authenticated context and the request message;
/// its `ServiceError` is logged with the caller's identity and rendered once.
pub async fn serve_unary<T, R, F, Fut>(request: Request<T>, handler: F) -> Result<Response<R>, Status>
where
    F: FnOnce(CallContext, T) -> Fut,
    Fut: Future<Output = Result<R, ServiceError>>,
{
    let ctx = call_context(&request)?;
    let message = request.into_inner();

    match ctx.bounded(handler(ctx.clone(), message)).await {
        Ok(Ok(reply)) => Ok(Response::new(reply)),
        Ok(Err(err)) => Err(to_status(&remap(&ctx, &err))),
        Err(_) => Err(to_status(&deadline_exceeded(&ctx))),
    }
}

/// Handler boundary for server-streaming and bidirectional calls
///
/// Failure to open the stream is remapped like a unary error. Once open, the
/// first `Err` item is the stream's terminal error: it is remapped, sent, and
/// the stream ends.
pub async fn serve_streaming<T, S, R, F, Fut>(
    request: Request<T>,
    handler: F,
) -> Result<Response<StatusStream<S>>, Status>
where
    F: FnOnce(CallContext, T) -> Fut,
    Fut: Future<Output = Result<S, ServiceError>>,
    S: Stream<Item = Result<R, ServiceError>>,
{
    let ctx = call_context(&request)?;
    let message = request.into_inner();

    match ctx.bounded(handler(ctx.clone(), message)).await {
        Ok(Ok(stream)) => Ok(Response::new(StatusStream::new(stream, ctx))),
        Ok(Err(err)) => Err(to_status(&remap(&ctx, &err))),
        Err(_) => Err(to_status(&deadline_exceeded(&ctx))),
    }
}

/// Response stream whose terminal error is rendered as a `Status`
#[pin_project]
pub struct StatusStream<S> {
    #[pin]
    inner: S,
    #[pin]
    deadline: Option<Sleep>,
    ctx: CallContext,
    finished: bool,
}

impl<S> StatusStream<S> {
    pub fn new(inner: S, ctx: CallContext) -> Self {
        Self {
            inner,
            deadline: ctx.deadline().map(tokio::time::sleep_until),
            ctx,
            finished: false,
        }
    }
}

impl<S, R> Stream for StatusStream<S>
where
    S: Stream<Item = Result<R, ServiceError>>,
{
    type Item = Result<R, Status>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.finished {
            return Poll::Ready(None);
        }

        if let Some(deadline) = this.deadline.as_pin_mut() {
            if deadline.poll(cx).is_ready() {
                *this.finished = true;
                return Poll::Ready(Some(Err(to_status(&deadline_exceeded(this.ctx)))));
            }
        }

        match ready!(this.inner.poll_next(cx)) {
            Some(Ok(item)) => Poll::Ready(Some(Ok(item))),
            Some(Err(err)) => {
                *this.finished = true;
                Poll::Ready(Some(Err(to_status(&remap(this.ctx, &err)))))
            }
            None => {
                *this.finished = true;
                Poll::Ready(None)
            }
        }
    }
}
