//! Shared fixtures: an in-process key service and token minting

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Duration;
use hmac::{Hmac, Mac};
use request_auth::{AuthSettings, Authenticator};
use request_context::CallContext;
use sha2::Sha256;
use signing_keys::token::{self, Claims};
use signing_keys::{DelegatedKey, KeyService, KeyServiceError, SigningAlgorithm, SigningKeyProvider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const KEY_PATH: &str = "alias/switchboard-auth";

#[derive(Default)]
pub struct FakeKeyService {
    verify_calls: AtomicUsize,
    outage: bool,
}

impl FakeKeyService {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn down() -> Arc<Self> {
        Arc::new(Self {
            outage: true,
            ..Self::default()
        })
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    fn mac(message: &[u8]) -> Vec<u8> {
        let mut mac = Hmac::<Sha256>::new_from_slice(b"held-by-key-service").unwrap();
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }
}

#[async_trait]
impl KeyService for FakeKeyService {
    async fn sign(
        &self,
        _key_path: &str,
        _algorithm: SigningAlgorithm,
        message: &[u8],
    ) -> Result<Vec<u8>, KeyServiceError> {
        Ok(Self::mac(message))
    }

    async fn verify(
        &self,
        _key_path: &str,
        _algorithm: SigningAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, KeyServiceError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.outage {
            return Err(KeyServiceError::Unreachable(
                "kms.eu-west-1.amazonaws.com: connection refused".to_string(),
            ));
        }
        Ok(Self::mac(message) == signature)
    }
}

pub fn provider(service: Arc<FakeKeyService>) -> SigningKeyProvider {
    SigningKeyProvider::Delegated(
        DelegatedKey::new(service, KEY_PATH, SigningAlgorithm::Rs256).unwrap(),
    )
}

pub fn authenticator(service: Arc<FakeKeyService>) -> Authenticator {
    Authenticator::new(provider(service), &AuthSettings::default())
}

/// Bearer token for `subject`, signed by the same fake key service
pub async fn mint(subject: &str) -> String {
    let signer = provider(FakeKeyService::healthy())
        .key(&CallContext::new("/test/Mint"))
        .unwrap();
    token::issue(&signer, &Claims::new(subject, Duration::minutes(5)))
        .await
        .unwrap()
}
