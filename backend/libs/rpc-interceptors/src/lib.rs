//! Interceptor chains for gRPC and Connect
//!
//! Four roles per transport, each wired the same way:
//!
//! | Role | gRPC (tonic) | Connect (actix-web / reqwest) |
//! |---|---|---|
//! | server authentication | `grpc::AuthLayer` | `connect::ConnectAuth` |
//! | server error remap (unary / streaming) | `grpc::serve_unary` / `grpc::serve_streaming` | `connect::serve_unary` / `connect::serve_streaming` |
//! | client identity, then tracing | `grpc::ClientChain` | `connect::ConnectClient` |
//! | client error decode (unary / streaming) | `grpc::call_unary` / `grpc::DomainStream` | `ConnectClient::unary` / `ConnectClient::server_stream` |
//!
//! Server side, authentication runs before the handler boundary, so the
//! remap step logs failures with the caller's identity. Streaming calls are
//! authenticated once, when the stream opens, and only the stream's terminal
//! error is remapped. Client side, the identity is attached before the
//! tracing step so outbound spans carry the principal.

pub mod connect;
pub mod error;
pub mod grpc;
pub mod metadata;
mod remap;
pub mod telemetry;

pub use error::ClientError;
pub use telemetry::init_tracing;
