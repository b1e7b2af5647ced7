//! Connect client (reqwest): identity propagation and error decoding

use crate::connect::frame::{EndStream, Frame, FrameDecoder};
use crate::connect::{PROTOCOL_VERSION, PROTOCOL_VERSION_HEADER, STREAMING_CONTENT_TYPE};
use crate::error::ClientError;
use crate::metadata::{CONNECT_TIMEOUT_MS, CORRELATION_ID_KEY};
use bytes::Bytes;
use error_types::connect::ConnectError;
use error_types::Code;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::RequestBuilder;
use request_context::CallContext;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Client for another service speaking the Connect protocol
#[derive(Clone)]
pub struct ConnectClient {
    http: reqwest::Client,
    base_url: String,
}

impl ConnectClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Unary call with JSON messages
    pub async fn unary<Req, Res>(
        &self,
        ctx: &CallContext,
        procedure: &str,
        request: &Req,
    ) -> Result<Res, ClientError>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let response = self.prepare(ctx, procedure)?.json(request).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            return serde_json::from_slice(&body)
                .map_err(|e| ClientError::Protocol(format!("invalid response message: {e}")));
        }
        Err(ClientError::from_connect(error_from_body(status.as_u16(), &body)))
    }

    /// Server-streaming call; the returned stream ends after the end-stream frame
    pub async fn server_stream<Req, Res>(
        &self,
        ctx: &CallContext,
        procedure: &str,
        request: &Req,
    ) -> Result<impl Stream<Item = Result<Res, ClientError>>, ClientError>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request)
            .map_err(|e| ClientError::Protocol(format!("invalid request message: {e}")))?;
        let response = self
            .prepare(ctx, procedure)?
            .header(CONTENT_TYPE, STREAMING_CONTENT_TYPE)
            .body(Frame::message(payload).encode())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.bytes().await?;
            return Err(ClientError::from_connect(error_from_body(status, &body)));
        }

        let state = StreamState {
            body: response.bytes_stream().boxed(),
            decoder: FrameDecoder::default(),
            finished: false,
        };
        Ok(stream::unfold(state, |mut state| async move {
            let item = state.next_message::<Res>().await?;
            Some((item, state))
        }))
    }

    /// Identity first, then tracing metadata
    fn prepare(&self, ctx: &CallContext, procedure: &str) -> Result<RequestBuilder, ClientError> {
        let url = format!("{}{}", self.base_url, procedure);
        let builder = self
            .http
            .post(url)
            .header(PROTOCOL_VERSION_HEADER, PROTOCOL_VERSION);
        let builder = attach_identity(builder, ctx);
        attach_tracing(builder, ctx, procedure)
    }
}

fn attach_identity(builder: RequestBuilder, ctx: &CallContext) -> RequestBuilder {
    match ctx.identity() {
        Some(identity) => builder.header(AUTHORIZATION, format!("Bearer {}", identity.credential())),
        None => builder,
    }
}

fn attach_tracing(
    builder: RequestBuilder,
    ctx: &CallContext,
    procedure: &str,
) -> Result<RequestBuilder, ClientError> {
    let mut builder = builder.header(CORRELATION_ID_KEY, ctx.correlation_id().as_str());

    if let Some(remaining) = ctx.remaining() {
        if remaining.is_zero() {
            return Err(ClientError::from_connect(ConnectError::new(
                Code::DeadlineExceeded,
                "deadline exceeded before the call started",
            )));
        }
        builder = builder
            .header(CONNECT_TIMEOUT_MS, remaining.as_millis().max(1).to_string())
            .timeout(remaining);
    }

    debug!(
        procedure = %procedure,
        correlation_id = %ctx.correlation_id(),
        principal = %ctx.principal().map(|p| p.as_str()).unwrap_or("anonymous"),
        "Outbound Connect call"
    );
    Ok(builder)
}

/// Connect error from a non-200 body; falls back to the HTTP status
fn error_from_body(status: u16, body: &[u8]) -> ConnectError {
    ConnectError::from_json(body).unwrap_or_else(|_| {
        ConnectError::new(
            Code::from_http_status(status),
            String::from_utf8_lossy(body).into_owned(),
        )
    })
}

struct StreamState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: FrameDecoder,
    finished: bool,
}

impl StreamState {
    async fn next_message<Res: DeserializeOwned>(&mut self) -> Option<Result<Res, ClientError>> {
        loop {
            if self.finished {
                return None;
            }
            match self.decoder.next_frame() {
                Err(e) => {
                    self.finished = true;
                    return Some(Err(ClientError::Protocol(e.to_string())));
                }
                Ok(Some(frame)) if frame.is_end_stream() => {
                    self.finished = true;
                    return match serde_json::from_slice::<EndStream>(&frame.payload) {
                        Ok(EndStream { error: Some(err) }) => Some(Err(ClientError::from_connect(err))),
                        Ok(EndStream { error: None }) => None,
                        Err(e) => Some(Err(ClientError::Protocol(format!(
                            "invalid end-stream message: {e}"
                        )))),
                    };
                }
                Ok(Some(frame)) => {
                    return Some(serde_json::from_slice(&frame.payload).map_err(|e| {
                        ClientError::Protocol(format!("invalid stream message: {e}"))
                    }));
                }
                Ok(None) => match self.body.next().await {
                    Some(Ok(chunk)) => self.decoder.push(&chunk),
                    Some(Err(e)) => {
                        self.finished = true;
                        return Some(Err(ClientError::Http(e)));
                    }
                    None => {
                        self.finished = true;
                        return Some(Err(ClientError::Protocol(
                            "stream ended without an end-stream frame".to_string(),
                        )));
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use error_types::{connect, BaseError, WireError};

    fn state_from(chunks: Vec<Bytes>) -> StreamState {
        StreamState {
            body: stream::iter(chunks.into_iter().map(Ok)).boxed(),
            decoder: FrameDecoder::default(),
            finished: false,
        }
    }

    #[tokio::test]
    async fn test_stream_messages_then_clean_end() {
        let mut state = state_from(vec![
            Frame::message(&b"1"[..]).encode(),
            Frame::message(&b"2"[..]).encode(),
            Frame::end_stream(&EndStream::default()).encode(),
        ]);

        assert_eq!(state.next_message::<i32>().await.unwrap().unwrap(), 1);
        assert_eq!(state.next_message::<i32>().await.unwrap().unwrap(), 2);
        assert!(state.next_message::<i32>().await.is_none());
    }

    #[tokio::test]
    async fn test_end_stream_error_is_decoded() {
        let error = connect::encode(&WireError::from_base(&BaseError::message_already_exists()));
        let mut state = state_from(vec![Frame::end_stream(&EndStream { error: Some(error) }).encode()]);

        let err = state.next_message::<i32>().await.unwrap().unwrap_err();

        assert_eq!(err.domain(), Some(&BaseError::message_already_exists()));
        assert!(state.next_message::<i32>().await.is_none());
    }

    #[tokio::test]
    async fn test_truncated_stream_is_a_protocol_error() {
        let mut state = state_from(vec![Frame::message(&b"1"[..]).encode()]);

        assert_eq!(state.next_message::<i32>().await.unwrap().unwrap(), 1);
        assert!(matches!(
            state.next_message::<i32>().await,
            Some(Err(ClientError::Protocol(_)))
        ));
    }

    #[test]
    fn test_error_from_non_connect_body() {
        let err = error_from_body(503, b"upstream connect error");
        assert_eq!(err.code, Code::Unavailable);
        assert_eq!(err.message, "upstream connect error");
    }
}
