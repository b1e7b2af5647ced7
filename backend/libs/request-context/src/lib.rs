//! Request-scoped call context shared by every transport
//!
//! A `CallContext` is created once per inbound call by the transport layer,
//! enriched by the authenticator and handed to handler code explicitly.
//! Nothing in here is global: the context lives exactly as long as the call.
//!
//! ## Core Components
//!
//! - **CallContext**: procedure path, resolved peer address, deadline and
//!   (optionally) the verified caller identity
//! - **Identity**: verified principal plus the raw credential it was derived from
//! - **TrustSource**: which signing key provider vouched for the identity

mod context;
mod identity;

pub use context::{CallContext, ContextError, CorrelationId};
pub use identity::{Identity, Principal, TrustSource};
