//! Compact JWS tokens signed by a `SigningKeyProvider`
//!
//! Header and claims are base64url (no padding) JSON. The signature covers
//! `header.claims` and is produced or checked by the provider's capability,
//! so private key material never passes through this module.

use crate::algorithm::SigningAlgorithm;
use crate::error::KeyError;
use crate::provider::{Signer, Verifier};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const TOKEN_TYPE: &str = "JWT";

/// Default clock skew tolerated on `exp` / `nbf`
pub const DEFAULT_LEEWAY_SECONDS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Principal the token speaks for
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    /// Claims for `subject`, valid from now for `ttl`
    pub fn new(subject: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: subject.into(),
            iss: None,
            aud: None,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            nbf: None,
            jti: Some(Uuid::new_v4().to_string()),
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.iss = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.aud = Some(audience.into());
        self
    }

    pub fn with_not_before(mut self, nbf: i64) -> Self {
        self.nbf = Some(nbf);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Claim checks applied after the signature verifies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPolicy {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway_seconds: i64,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            issuer: None,
            audience: None,
            leeway_seconds: DEFAULT_LEEWAY_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token algorithm {found} does not match key algorithm {expected}")]
    AlgorithmMismatch {
        expected: SigningAlgorithm,
        found: String,
    },

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("token issuer is not trusted")]
    IssuerMismatch,

    #[error("token audience does not match")]
    AudienceMismatch,

    #[error(transparent)]
    Key(#[from] KeyError),
}

impl TokenError {
    /// True when the caller presented something unusable, false when the
    /// key infrastructure failed
    pub fn is_caller_fault(&self) -> bool {
        !matches!(self, TokenError::Key(_))
    }
}

/// Sign `claims` into a compact token
pub async fn issue(signer: &Signer, claims: &Claims) -> Result<String, TokenError> {
    let header = TokenHeader {
        alg: signer.algorithm().jwt_name().to_string(),
        typ: Some(TOKEN_TYPE.to_string()),
    };
    let signing_input = format!("{}.{}", encode_part(&header)?, encode_part(claims)?);
    let signature = signer.sign(signing_input.as_bytes()).await?;
    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Check the signature through `verifier`, then the claims against `policy`
pub async fn verify(
    token: &str,
    verifier: &Verifier,
    policy: &TokenPolicy,
) -> Result<Claims, TokenError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed(
            "expected three dot-separated segments".to_string(),
        ));
    };

    let header: TokenHeader = decode_part(header_b64, "header")?;
    let expected = verifier.algorithm();
    if header.alg != expected.jwt_name() {
        return Err(TokenError::AlgorithmMismatch {
            expected,
            found: header.alg,
        });
    }

    let claims: Claims = decode_part(claims_b64, "claims")?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|e| TokenError::Malformed(format!("signature: {e}")))?;
    if signature.is_empty() {
        return Err(TokenError::Malformed("empty signature".to_string()));
    }

    let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
    if !verifier.verify(signing_input.as_bytes(), &signature).await? {
        return Err(TokenError::BadSignature);
    }

    check_claims(&claims, policy, Utc::now().timestamp())?;
    Ok(claims)
}

fn check_claims(claims: &Claims, policy: &TokenPolicy, now: i64) -> Result<(), TokenError> {
    if claims.sub.trim().is_empty() {
        return Err(TokenError::Malformed("empty subject".to_string()));
    }
    if now > claims.exp + policy.leeway_seconds {
        return Err(TokenError::Expired);
    }
    if let Some(nbf) = claims.nbf {
        if now + policy.leeway_seconds < nbf {
            return Err(TokenError::NotYetValid);
        }
    }
    if let Some(issuer) = &policy.issuer {
        if claims.iss.as_ref() != Some(issuer) {
            return Err(TokenError::IssuerMismatch);
        }
    }
    if let Some(audience) = &policy.audience {
        if claims.aud.as_ref() != Some(audience) {
            return Err(TokenError::AudienceMismatch);
        }
    }
    Ok(())
}

fn encode_part<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|e| TokenError::Malformed(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_part<T: for<'de> Deserialize<'de>>(part: &str, what: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| TokenError::Malformed(format!("{what}: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(format!("{what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp: i64) -> Claims {
        Claims {
            sub: "user-1".to_string(),
            iss: Some("switchboard".to_string()),
            aud: Some("api".to_string()),
            iat: 0,
            exp,
            nbf: None,
            jti: None,
        }
    }

    #[test]
    fn test_expiry_honours_leeway() {
        let policy = TokenPolicy::default();
        assert_eq!(check_claims(&claims(1_000), &policy, 1_020), Ok(()));
        assert_eq!(
            check_claims(&claims(1_000), &policy, 1_031),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_not_before() {
        let policy = TokenPolicy {
            leeway_seconds: 0,
            ..TokenPolicy::default()
        };
        let early = claims(5_000).with_not_before(2_000);
        assert_eq!(
            check_claims(&early, &policy, 1_999),
            Err(TokenError::NotYetValid)
        );
        assert_eq!(check_claims(&early, &policy, 2_000), Ok(()));
    }

    #[test]
    fn test_issuer_and_audience() {
        let policy = TokenPolicy {
            issuer: Some("switchboard".to_string()),
            audience: Some("other".to_string()),
            ..TokenPolicy::default()
        };
        assert_eq!(
            check_claims(&claims(i64::MAX / 2), &policy, 0),
            Err(TokenError::AudienceMismatch)
        );

        let policy = TokenPolicy {
            issuer: Some("someone-else".to_string()),
            ..TokenPolicy::default()
        };
        assert_eq!(
            check_claims(&claims(i64::MAX / 2), &policy, 0),
            Err(TokenError::IssuerMismatch)
        );
    }

    #[test]
    fn test_claims_json_omits_unset_fields() {
        let json = serde_json::to_value(Claims {
            iss: None,
            aud: None,
            ..claims(10)
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"sub": "user-1", "iat": 0, "exp": 10}));
    }

    #[test]
    fn test_key_errors_are_not_caller_faults() {
        assert!(TokenError::Expired.is_caller_fault());
        assert!(!TokenError::Key(KeyError::DeadlineExceeded).is_caller_fault());
    }
}
