//! gRPC (tonic) interceptors
//!
//! - Server: `AuthLayer` authenticates every HTTP/2 request (one per stream)
//!   before tonic routes it; `serve_unary` / `serve_streaming` are the handler
//!   boundary that remaps `ServiceError` into a `Status`.
//! - Client: `ClientChain` attaches the identity first, then correlation and
//!   deadline metadata; `call_unary` / `DomainStream` turn received statuses
//!   back into domain errors.

pub mod client;
pub mod extensions;
pub mod server;

pub use client::{
    call_streaming, call_unary, ClientChain, DomainStream, IdentityInterceptor, OutboundCall,
    TracingInterceptor,
};
pub use extensions::CallContextExt;
pub use server::{serve_streaming, serve_unary, AuthLayer, AuthService, StatusStream};
