//! Verified caller identity
//!
//! An `Identity` only exists after a credential has been verified. It is
//! immutable, request-scoped and not serializable. It must never
//! be persisted or leave the process except as the raw credential re-attached
//! to nested outbound calls.

use std::fmt;

/// Reference to the authenticated principal (the `sub` claim of the credential)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal(String);

impl Principal {
    pub fn new(subject: impl Into<String>) -> Self {
        Self(subject.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which signing key provider vouched for an identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustSource {
    /// Verified by a remote key service against the given key path
    DelegatedKey { key_path: String },

    /// Issued under an in-memory static secret (test configurations only)
    StaticSecret,
}

impl fmt::Display for TrustSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustSource::DelegatedKey { key_path } => write!(f, "delegated:{key_path}"),
            TrustSource::StaticSecret => f.write_str("static-secret"),
        }
    }
}

/// Verified caller identity attached to a call for its duration
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    principal: Principal,
    credential: String,
    source: TrustSource,
}

impl Identity {
    /// Build an identity from an already verified credential
    pub fn new(principal: Principal, credential: impl Into<String>, source: TrustSource) -> Self {
        Self {
            principal,
            credential: credential.into(),
            source,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Raw verified credential, suitable for re-attaching to outbound calls
    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn source(&self) -> &TrustSource {
        &self.source
    }
}

// Credential is redacted so identities can be logged with `?identity`.
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("principal", &self.principal)
            .field("credential", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}
