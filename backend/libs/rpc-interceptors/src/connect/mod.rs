//! Connect protocol interceptors (browser-compatible RPC)
//!
//! Unary calls are plain JSON POSTs; errors come back as a JSON body with an
//! HTTP status derived from the code. Streaming calls use framed
//! `application/connect+json` bodies and report errors in the end-stream frame.

pub mod client;
pub mod frame;
pub mod server;

pub use client::ConnectClient;
pub use frame::{EndStream, Frame, FrameDecoder, FrameError};
pub use server::{serve_streaming, serve_unary, Caller, ConnectAuth, ConnectFailure, FramedStream};

pub const UNARY_CONTENT_TYPE: &str = "application/json";
pub const STREAMING_CONTENT_TYPE_PREFIX: &str = "application/connect+";
pub const STREAMING_CONTENT_TYPE: &str = "application/connect+json";
pub const PROTOCOL_VERSION_HEADER: &str = "connect-protocol-version";
pub const PROTOCOL_VERSION: &str = "1";
