//! Issue and verify tokens through a delegated provider backed by an
//! in-process key service.

use async_trait::async_trait;
use chrono::Duration;
use hmac::{Hmac, Mac};
use request_context::CallContext;
use sha2::Sha256;
use signing_keys::token::{self, Claims, TokenError, TokenPolicy};
use signing_keys::{
    DelegatedKey, Environment, KeyError, KeyService, KeyServiceError, SigningAlgorithm,
    SigningKeyProvider, StaticSecretKey,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Key service that "holds" one HMAC secret per key path
#[derive(Default)]
struct InProcessKeyService {
    keys: HashMap<String, Vec<u8>>,
    verify_calls: AtomicUsize,
    fail_with: Option<KeyServiceError>,
}

impl InProcessKeyService {
    fn with_key(mut self, key_path: &str, secret: &[u8]) -> Self {
        self.keys.insert(key_path.to_string(), secret.to_vec());
        self
    }

    fn mac(&self, key_path: &str, message: &[u8]) -> Result<Vec<u8>, KeyServiceError> {
        let secret = self
            .keys
            .get(key_path)
            .ok_or_else(|| KeyServiceError::Rejected(format!("no key at {key_path}")))?;
        let mut mac = Hmac::<Sha256>::new_from_slice(secret).unwrap();
        mac.update(message);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[async_trait]
impl KeyService for InProcessKeyService {
    async fn sign(
        &self,
        key_path: &str,
        _algorithm: SigningAlgorithm,
        message: &[u8],
    ) -> Result<Vec<u8>, KeyServiceError> {
        self.mac(key_path, message)
    }

    async fn verify(
        &self,
        key_path: &str,
        _algorithm: SigningAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, KeyServiceError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        Ok(self.mac(key_path, message)? == signature)
    }
}

fn provider(service: Arc<InProcessKeyService>, key_path: &str) -> SigningKeyProvider {
    SigningKeyProvider::Delegated(
        DelegatedKey::new(service, key_path, SigningAlgorithm::Rs256).unwrap(),
    )
}

fn ctx() -> CallContext {
    CallContext::new("/quotes.v1.QuoteService/GetQuote")
}

#[tokio::test]
async fn test_issued_token_verifies() {
    let service = Arc::new(InProcessKeyService::default().with_key("alias/auth", b"k1"));
    let provider = provider(service.clone(), "alias/auth");

    let claims = Claims::new("svc-billing", Duration::minutes(5)).with_issuer("switchboard");
    let signed = token::issue(&provider.key(&ctx()).unwrap(), &claims)
        .await
        .unwrap();

    let policy = TokenPolicy {
        issuer: Some("switchboard".to_string()),
        ..TokenPolicy::default()
    };
    let verified = token::verify(&signed, &provider.verifier(&ctx()).unwrap(), &policy)
        .await
        .unwrap();

    assert_eq!(verified, claims);
    assert_eq!(service.verify_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_token_from_another_key_is_rejected() {
    let service = Arc::new(
        InProcessKeyService::default()
            .with_key("alias/auth", b"k1")
            .with_key("alias/other", b"k2"),
    );
    let signer = provider(service.clone(), "alias/other").key(&ctx()).unwrap();
    let signed = token::issue(&signer, &Claims::new("svc", Duration::minutes(5)))
        .await
        .unwrap();

    let verifier = provider(service, "alias/auth").verifier(&ctx()).unwrap();
    let result = token::verify(&signed, &verifier, &TokenPolicy::default()).await;

    assert_eq!(result, Err(TokenError::BadSignature));
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let service = Arc::new(InProcessKeyService::default().with_key("alias/auth", b"k1"));
    let provider = provider(service, "alias/auth");
    let claims = Claims::new("svc", Duration::minutes(-10));
    let signed = token::issue(&provider.key(&ctx()).unwrap(), &claims)
        .await
        .unwrap();

    let result = token::verify(
        &signed,
        &provider.verifier(&ctx()).unwrap(),
        &TokenPolicy::default(),
    )
    .await;

    assert_eq!(result, Err(TokenError::Expired));
}

#[tokio::test]
async fn test_algorithm_mismatch_is_rejected_before_key_service() {
    let service = Arc::new(InProcessKeyService::default().with_key("alias/auth", b"k1"));
    let static_key = SigningKeyProvider::StaticSecret(
        StaticSecretKey::new(b"test-secret", Environment::Test).unwrap(),
    );
    let hs256 = token::issue(
        &static_key.key(&ctx()).unwrap(),
        &Claims::new("svc", Duration::minutes(5)),
    )
    .await
    .unwrap();

    let verifier = provider(service.clone(), "alias/auth")
        .verifier(&ctx())
        .unwrap();
    let result = token::verify(&hs256, &verifier, &TokenPolicy::default()).await;

    assert!(matches!(result, Err(TokenError::AlgorithmMismatch { .. })));
    assert_eq!(service.verify_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_tokens() {
    let service = Arc::new(InProcessKeyService::default().with_key("alias/auth", b"k1"));
    let verifier = provider(service, "alias/auth").verifier(&ctx()).unwrap();

    for bad in ["", "abc", "a.b", "a.b.c.d", "!!.??.$$"] {
        let result = token::verify(bad, &verifier, &TokenPolicy::default()).await;
        assert!(
            matches!(result, Err(TokenError::Malformed(_))),
            "{bad:?} gave {result:?}"
        );
    }
}

#[tokio::test]
async fn test_key_service_outage_surfaces_as_key_error() {
    let mut service = InProcessKeyService::default().with_key("alias/auth", b"k1");
    let signer_service = Arc::new(InProcessKeyService::default().with_key("alias/auth", b"k1"));
    let signed = token::issue(
        &provider(signer_service, "alias/auth").key(&ctx()).unwrap(),
        &Claims::new("svc", Duration::minutes(5)),
    )
    .await
    .unwrap();

    service.fail_with = Some(KeyServiceError::Unreachable("connection refused".to_string()));
    let verifier = provider(Arc::new(service), "alias/auth")
        .verifier(&ctx())
        .unwrap();
    let result = token::verify(&signed, &verifier, &TokenPolicy::default()).await;

    assert_eq!(
        result,
        Err(TokenError::Key(KeyError::Service(KeyServiceError::Unreachable(
            "connection refused".to_string()
        ))))
    );
    assert!(!result.unwrap_err().is_caller_fault());
}
