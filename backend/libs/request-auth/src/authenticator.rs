//! Credential verification shared by every interceptor
//!
//! `Authenticator::authenticate` takes a plain header map, the procedure
//! path and the connection's remote address, so the same call serves gRPC and
//! Connect, unary and streaming alike.

use crate::config::AuthSettings;
use crate::error::{AuthError, FailureClass};
use crate::peer::resolve_peer_address;
use http::header::AUTHORIZATION;
use http::HeaderMap;
use request_context::{CallContext, Identity, Principal};
use signing_keys::token::{self, TokenPolicy};
use signing_keys::SigningKeyProvider;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, warn};

const BEARER_SCHEME: &str = "bearer";

#[derive(Clone)]
pub struct Authenticator {
    provider: Arc<SigningKeyProvider>,
    policy: TokenPolicy,
    public_procedures: Arc<HashSet<String>>,
}

impl Authenticator {
    pub fn new(provider: SigningKeyProvider, settings: &AuthSettings) -> Self {
        Self {
            provider: Arc::new(provider),
            policy: settings.policy(),
            public_procedures: Arc::new(settings.public_procedures.iter().cloned().collect()),
        }
    }

    pub fn provider(&self) -> &SigningKeyProvider {
        &self.provider
    }

    pub fn is_public(&self, procedure: &str) -> bool {
        self.public_procedures.contains(procedure)
    }

    /// Verify the caller and derive the call's context
    ///
    /// `parent` contributes the deadline and correlation id. On success the
    /// returned context carries the resolved peer address and, unless the
    /// procedure is public, the caller's identity. Failures are logged here;
    /// service-side detail never reaches the returned error's caller message.
    pub async fn authenticate(
        &self,
        parent: &CallContext,
        procedure: &str,
        headers: &HeaderMap,
        remote_addr: Option<&str>,
    ) -> Result<CallContext, AuthError> {
        let peer = resolve_peer_address(headers, remote_addr);
        let ctx = CallContext::new(procedure)
            .with_peer(peer)
            .with_deadline(parent.deadline())
            .with_correlation_id(parent.correlation_id().clone());

        if self.is_public(procedure) {
            debug!(procedure = %procedure, peer = %peer, "Public procedure, skipping credential check");
            return Ok(ctx);
        }

        match self.verify(&ctx, headers).await {
            Ok(identity) => {
                debug!(
                    procedure = %procedure,
                    peer = %peer,
                    principal = %identity.principal(),
                    "Caller authenticated"
                );
                Ok(ctx.with_identity(identity))
            }
            Err(err) => {
                match err.class() {
                    FailureClass::Service => error!(
                        procedure = %procedure,
                        peer = %peer,
                        correlation_id = %ctx.correlation_id(),
                        error = %err,
                        "Authentication service failure"
                    ),
                    FailureClass::Caller => warn!(
                        procedure = %procedure,
                        peer = %peer,
                        error = %err,
                        "Authentication rejected"
                    ),
                }
                Err(err)
            }
        }
    }

    async fn verify(&self, ctx: &CallContext, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let credential = bearer_token(headers)?;
        let verifier = self.provider.verifier(ctx)?;
        let claims = token::verify(credential, &verifier, &self.policy).await?;
        Ok(Identity::new(
            Principal::new(claims.sub),
            credential,
            self.provider.trust_source(),
        ))
    }
}

/// Extract the token from `authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;
    let value = value
        .to_str()
        .map_err(|_| AuthError::MalformedHeader("value is not visible ASCII".to_string()))?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| AuthError::MalformedHeader("expected `Bearer <token>`".to_string()))?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return Err(AuthError::MalformedHeader(format!(
            "unsupported scheme `{scheme}`"
        )));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedHeader("empty bearer token".to_string()));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn with_authorization(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(
            bearer_token(&with_authorization("Bearer abc.def.ghi")),
            Ok("abc.def.ghi")
        );
        assert_eq!(
            bearer_token(&with_authorization("bearer   abc.def.ghi ")),
            Ok("abc.def.ghi")
        );
    }

    #[test]
    fn test_bearer_token_failures() {
        assert_eq!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingCredential)
        );
        assert!(matches!(
            bearer_token(&with_authorization("Basic dXNlcjpwYXNz")),
            Err(AuthError::MalformedHeader(_))
        ));
        assert!(matches!(
            bearer_token(&with_authorization("Bearer")),
            Err(AuthError::MalformedHeader(_))
        ));
        assert!(matches!(
            bearer_token(&with_authorization("Bearer    ")),
            Err(AuthError::MalformedHeader(_))
        ));
    }
}
