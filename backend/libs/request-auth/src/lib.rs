//! Caller authentication for RPC interceptors
//!
//! Turns the raw credential material of a call (headers, procedure path,
//! remote address) into a `CallContext` carrying a verified `Identity`, or a
//! classified `AuthError`:
//!
//! - caller failures (missing, malformed, expired, wrong key) keep their
//!   message so clients can act on it
//! - service failures (key service down, verifier unusable) are logged in
//!   full and reported as "authentication service error, try again later"

pub mod authenticator;
pub mod config;
pub mod error;
pub mod peer;

pub use authenticator::{bearer_token, Authenticator};
pub use config::AuthSettings;
pub use error::{AuthError, FailureClass, AUTH_SERVICE_ERROR_MESSAGE};
pub use peer::resolve_peer_address;
