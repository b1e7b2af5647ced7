//! Signing key providers
//!
//! The set of providers is closed: a static secret for tests and a delegated
//! key held by a remote key service. Both hand out a `Signer` (`key`) and a
//! `Verifier` (`verifier`) bound to the calling context.

use crate::algorithm::SigningAlgorithm;
use crate::config::Environment;
use crate::error::KeyError;
use crate::key_service::KeyService;
use hmac::{Hmac, Mac};
use request_context::{CallContext, ContextError, TrustSource};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use tracing::error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub enum SigningKeyProvider {
    /// In-memory HMAC secret. Test configurations only.
    StaticSecret(StaticSecretKey),
    /// Key held by a remote key service
    Delegated(DelegatedKey),
}

impl SigningKeyProvider {
    /// Diagnostic name
    pub fn name(&self) -> &'static str {
        match self {
            SigningKeyProvider::StaticSecret(_) => StaticSecretKey::NAME,
            SigningKeyProvider::Delegated(_) => DelegatedKey::NAME,
        }
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        match self {
            SigningKeyProvider::StaticSecret(_) => SigningAlgorithm::Hs256,
            SigningKeyProvider::Delegated(key) => key.algorithm,
        }
    }

    pub fn trust_source(&self) -> TrustSource {
        match self {
            SigningKeyProvider::StaticSecret(_) => TrustSource::StaticSecret,
            SigningKeyProvider::Delegated(key) => TrustSource::DelegatedKey {
                key_path: key.key_path.clone(),
            },
        }
    }

    /// Signing capability for the current call
    pub fn key(&self, ctx: &CallContext) -> Result<Signer, KeyError> {
        match self {
            SigningKeyProvider::StaticSecret(key) => Ok(Signer(SignerKind::Hmac {
                secret: key.secret.clone(),
            })),
            SigningKeyProvider::Delegated(key) => Ok(Signer(SignerKind::Delegated(Remote {
                service: key.service.clone(),
                key_path: key.key_path.clone(),
                algorithm: key.algorithm,
                ctx: ctx.clone(),
            }))),
        }
    }

    /// Verification capability for the current call
    ///
    /// Rebuilt on every call from this provider's own key path and the
    /// caller's deadline; never cached or borrowed from the signing side.
    pub fn verifier(&self, ctx: &CallContext) -> Result<Verifier, KeyError> {
        match self {
            SigningKeyProvider::StaticSecret(_) => {
                error!(
                    procedure = %ctx.procedure(),
                    "Static-secret provider asked to verify a credential; it has no verifier"
                );
                Err(KeyError::VerifierUnavailable {
                    provider: StaticSecretKey::NAME,
                })
            }
            SigningKeyProvider::Delegated(key) => Ok(Verifier(Remote {
                service: key.service.clone(),
                key_path: key.key_path.clone(),
                algorithm: key.algorithm,
                ctx: ctx.clone(),
            })),
        }
    }
}

impl fmt::Debug for SigningKeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningKeyProvider::StaticSecret(_) => f.write_str("StaticSecret(<redacted>)"),
            SigningKeyProvider::Delegated(key) => f
                .debug_struct("Delegated")
                .field("key_path", &key.key_path)
                .field("algorithm", &key.algorithm)
                .finish(),
        }
    }
}

/// HMAC secret; refuses to exist outside `Environment::Test`
#[derive(Clone)]
pub struct StaticSecretKey {
    secret: Arc<[u8]>,
}

impl StaticSecretKey {
    pub const NAME: &'static str = "static-secret";

    pub fn new(secret: &[u8], environment: Environment) -> Result<Self, KeyError> {
        if !environment.is_test() {
            return Err(KeyError::StaticKeyOutsideTests { environment });
        }
        if secret.is_empty() {
            return Err(KeyError::Misconfigured("static secret is empty".to_string()));
        }
        Ok(Self {
            secret: Arc::from(secret),
        })
    }
}

#[derive(Clone)]
pub struct DelegatedKey {
    service: Arc<dyn KeyService>,
    key_path: String,
    algorithm: SigningAlgorithm,
}

impl DelegatedKey {
    pub const NAME: &'static str = "delegated-key-service";

    pub fn new(
        service: Arc<dyn KeyService>,
        key_path: impl Into<String>,
        algorithm: SigningAlgorithm,
    ) -> Result<Self, KeyError> {
        let key_path = key_path.into();
        if key_path.trim().is_empty() {
            return Err(KeyError::Misconfigured("key path is empty".to_string()));
        }
        if algorithm == SigningAlgorithm::Hs256 {
            return Err(KeyError::Misconfigured(
                "delegated keys are asymmetric; HS256 is not available".to_string(),
            ));
        }
        Ok(Self {
            service,
            key_path,
            algorithm,
        })
    }

    pub fn key_path(&self) -> &str {
        &self.key_path
    }
}

/// Remote key reference bound to one call
#[derive(Clone)]
struct Remote {
    service: Arc<dyn KeyService>,
    key_path: String,
    algorithm: SigningAlgorithm,
    ctx: CallContext,
}

/// Opaque signing capability
#[derive(Clone)]
pub struct Signer(SignerKind);

#[derive(Clone)]
enum SignerKind {
    Hmac { secret: Arc<[u8]> },
    Delegated(Remote),
}

impl Signer {
    pub fn algorithm(&self) -> SigningAlgorithm {
        match &self.0 {
            SignerKind::Hmac { .. } => SigningAlgorithm::Hs256,
            SignerKind::Delegated(remote) => remote.algorithm,
        }
    }

    pub async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        match &self.0 {
            SignerKind::Hmac { secret } => {
                let mut mac = HmacSha256::new_from_slice(secret)
                    .map_err(|e| KeyError::Misconfigured(e.to_string()))?;
                mac.update(message);
                Ok(mac.finalize().into_bytes().to_vec())
            }
            SignerKind::Delegated(remote) => {
                let call = remote
                    .service
                    .sign(&remote.key_path, remote.algorithm, message);
                Ok(remote.ctx.bounded(call).await.map_err(deadline)??)
            }
        }
    }
}

/// Verification capability bound to one call
#[derive(Clone)]
pub struct Verifier(Remote);

impl Verifier {
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.0.algorithm
    }

    pub fn key_path(&self) -> &str {
        &self.0.key_path
    }

    /// One key-service round trip, bounded by the call deadline
    pub async fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        let call = self
            .0
            .service
            .verify(&self.0.key_path, self.0.algorithm, message, signature);
        Ok(self.0.ctx.bounded(call).await.map_err(deadline)??)
    }
}

fn deadline(_: ContextError) -> KeyError {
    KeyError::DeadlineExceeded
}
