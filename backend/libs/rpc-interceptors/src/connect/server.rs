//! Connect server side (actix-web): authentication middleware and handler boundary

use crate::connect::frame::{decode_all, EndStream, Frame};
use crate::connect::{STREAMING_CONTENT_TYPE, STREAMING_CONTENT_TYPE_PREFIX, UNARY_CONTENT_TYPE};
use crate::metadata::{parent_context, parse_connect_timeout, CONNECT_TIMEOUT_MS};
use crate::remap::{deadline_exceeded, remap};
use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{self, HeaderMap as ActixHeaderMap};
use actix_web::http::StatusCode;
use actix_web::web::Bytes;
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError};
use error_types::connect::{self, ConnectError};
use error_types::{Code, ServiceError, WireError, GENERIC_INTERNAL_MESSAGE};
use futures::future::{ready, LocalBoxFuture, Ready};
use futures::Stream;
use pin_project::pin_project;
use request_auth::Authenticator;
use request_context::CallContext;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use tokio::time::Sleep;
use tracing::Instrument;

/// Authenticates every Connect call before it reaches a handler
///
/// The derived `CallContext` is stored in the request extensions and read by
/// the `Caller` extractor. Failures are answered in the call's own shape: a
/// JSON error with the mapped HTTP status for unary calls, an end-stream
/// frame for streaming calls.
///
/// ```rust,ignore
/// App::new()
///     .wrap(ConnectAuth::new(authenticator.clone()))
///     .route("/quotes.v1.QuoteService/SubmitQuote", web::post().to(submit_quote))
/// ```
#[derive(Clone)]
pub struct ConnectAuth {
    authenticator: Authenticator,
}

impl ConnectAuth {
    pub fn new(authenticator: Authenticator) -> Self {
        Self { authenticator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ConnectAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = ConnectAuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ConnectAuthMiddleware {
            service: Rc::new(service),
            authenticator: self.authenticator.clone(),
        }))
    }
}

pub struct ConnectAuthMiddleware<S> {
    service: Rc<S>,
    authenticator: Authenticator,
}

impl<S, B> Service<ServiceRequest> for ConnectAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let authenticator = self.authenticator.clone();

        let procedure = req.path().to_string();
        let headers = to_header_map(req.headers());
        let remote_addr = req.peer_addr().map(|addr| addr.to_string());
        let streaming = is_streaming(req.headers());
        let parent = parent_context(&procedure, &headers, CONNECT_TIMEOUT_MS, parse_connect_timeout);
        let span = tracing::info_span!(
            "connect_request",
            rpc.method = %procedure,
            correlation_id = %parent.correlation_id(),
        );

        Box::pin(
            async move {
                match authenticator
                    .authenticate(&parent, &procedure, &headers, remote_addr.as_deref())
                    .await
                {
                    Ok(ctx) => {
                        req.extensions_mut().insert(ctx);
                        service.call(req).await.map(|res| res.map_into_left_body())
                    }
                    Err(err) => {
                        let failure = connect::encode(&err.to_wire());
                        let response = if streaming {
                            end_stream_response(failure)
                        } else {
                            ConnectFailure(failure).error_response()
                        };
                        Ok(req.into_response(response).map_into_right_body())
                    }
                }
            }
            .instrument(span),
        )
    }
}

/// Copy actix headers into the transport-neutral map the authenticator takes
fn to_header_map(headers: &ActixHeaderMap) -> http::HeaderMap {
    let mut map = http::HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if let (Ok(name), Ok(value)) = (
            http::HeaderName::from_bytes(name.as_str().as_bytes()),
            http::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            map.append(name, value);
        }
    }
    map
}

fn is_streaming(headers: &ActixHeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with(STREAMING_CONTENT_TYPE_PREFIX))
        .unwrap_or(false)
}

/// Streaming response consisting of nothing but a failed end-stream frame
fn end_stream_response(error: ConnectError) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(STREAMING_CONTENT_TYPE)
        .body(Frame::end_stream(&EndStream { error: Some(error) }).encode())
}

/// Unary Connect error response
#[derive(Debug)]
pub struct ConnectFailure(pub ConnectError);

impl fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<&WireError> for ConnectFailure {
    fn from(wire: &WireError) -> Self {
        ConnectFailure(connect::encode(wire))
    }
}

impl ResponseError for ConnectFailure {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type(UNARY_CONTENT_TYPE)
            .body(self.0.to_json())
    }
}

/// Authenticated call context, extracted from the request
pub struct Caller(pub CallContext);

impl FromRequest for Caller {
    type Error = ConnectFailure;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<CallContext>() {
            Some(ctx) => ready(Ok(Caller(ctx.clone()))),
            None => {
                tracing::error!(path = %req.path(), "Call context missing; is ConnectAuth installed?");
                ready(Err(ConnectFailure(ConnectError::new(
                    Code::Internal,
                    GENERIC_INTERNAL_MESSAGE,
                ))))
            }
        }
    }
}

/// Handler boundary for unary Connect calls (JSON codec)
///
/// ```rust,ignore
/// async fn submit_quote(caller: Caller, body: Bytes) -> Result<HttpResponse, ConnectFailure> {
///     serve_unary(caller, body, |ctx, req: SubmitQuoteRequest| quotes::submit(ctx, req)).await
/// }
/// ```
pub async fn serve_unary<Req, Res, F, Fut>(
    caller: Caller,
    body: Bytes,
    handler: F,
) -> Result<HttpResponse, ConnectFailure>
where
    Req: DeserializeOwned,
    Res: Serialize,
    F: FnOnce(CallContext, Req) -> Fut,
    Fut: Future<Output = Result<Res, ServiceError>>,
{
    let Caller(ctx) = caller;
    let request: Req = serde_json::from_slice(&body).map_err(|e| {
        ConnectFailure(ConnectError::new(
            Code::InvalidArgument,
            format!("invalid request body: {e}"),
        ))
    })?;

    match ctx.bounded(handler(ctx.clone(), request)).await {
        Ok(Ok(reply)) => Ok(HttpResponse::Ok().json(reply)),
        Ok(Err(err)) => Err(ConnectFailure::from(&remap(&ctx, &err))),
        Err(_) => Err(ConnectFailure::from(&deadline_exceeded(&ctx))),
    }
}

/// Handler boundary for server-streaming Connect calls
///
/// The request body holds one framed message. Every outcome, including a
/// failure to open the stream, is reported in the trailing end-stream frame.
pub async fn serve_streaming<Req, Res, S, F, Fut>(caller: Caller, body: Bytes, handler: F) -> HttpResponse
where
    Req: DeserializeOwned,
    Res: Serialize + 'static,
    S: Stream<Item = Result<Res, ServiceError>> + 'static,
    F: FnOnce(CallContext, Req) -> Fut,
    Fut: Future<Output = Result<S, ServiceError>>,
{
    let Caller(ctx) = caller;
    let request: Req = match decode_request(&body) {
        Ok(request) => request,
        Err(message) => {
            return end_stream_response(ConnectError::new(Code::InvalidArgument, message));
        }
    };

    match ctx.bounded(handler(ctx.clone(), request)).await {
        Ok(Ok(stream)) => HttpResponse::Ok()
            .content_type(STREAMING_CONTENT_TYPE)
            .streaming(FramedStream::new(stream, ctx)),
        Ok(Err(err)) => end_stream_response(connect::encode(&remap(&ctx, &err))),
        Err(_) => end_stream_response(connect::encode(&deadline_exceeded(&ctx))),
    }
}

fn decode_request<Req: DeserializeOwned>(body: &[u8]) -> Result<Req, String> {
    let frames = decode_all(body).map_err(|e| format!("invalid request envelope: {e}"))?;
    match frames.as_slice() {
        [frame] if !frame.is_end_stream() => serde_json::from_slice(&frame.payload)
            .map_err(|e| format!("invalid request message: {e}")),
        _ => Err(format!(
            "expected exactly one request message, got {} frames",
            frames.len()
        )),
    }
}

/// Frames handler messages and closes with an end-stream frame
///
/// The first `Err` item (or the deadline) becomes the end-stream error and
/// nothing is read from the handler after it.
#[pin_project]
pub struct FramedStream<S> {
    #[pin]
    inner: S,
    #[pin]
    deadline: Option<Sleep>,
    ctx: CallContext,
    finished: bool,
}

impl<S> FramedStream<S> {
    pub fn new(inner: S, ctx: CallContext) -> Self {
        Self {
            inner,
            deadline: ctx.deadline().map(tokio::time::sleep_until),
            ctx,
            finished: false,
        }
    }
}

impl<S, Res> Stream for FramedStream<S>
where
    S: Stream<Item = Result<Res, ServiceError>>,
    Res: Serialize,
{
    type Item = Result<Bytes, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.finished {
            return Poll::Ready(None);
        }

        let closing = |error: Option<WireError>| {
            Frame::end_stream(&EndStream {
                error: error.as_ref().map(connect::encode),
            })
            .encode()
        };

        if let Some(deadline) = this.deadline.as_pin_mut() {
            if deadline.poll(cx).is_ready() {
                *this.finished = true;
                return Poll::Ready(Some(Ok(closing(Some(deadline_exceeded(this.ctx))))));
            }
        }

        let frame = match this.inner.poll_next(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Some(Ok(message))) => match serde_json::to_vec(&message) {
                Ok(payload) => Frame::message(payload).encode(),
                Err(e) => {
                    tracing::error!(
                        procedure = %this.ctx.procedure(),
                        error = %e,
                        "Failed to serialize stream message"
                    );
                    *this.finished = true;
                    closing(Some(WireError::new(Code::Internal, GENERIC_INTERNAL_MESSAGE)))
                }
            },
            Poll::Ready(Some(Err(err))) => {
                *this.finished = true;
                closing(Some(remap(this.ctx, &err)))
            }
            Poll::Ready(None) => {
                *this.finished = true;
                closing(None)
            }
        };
        Poll::Ready(Some(Ok(frame)))
    }
}
