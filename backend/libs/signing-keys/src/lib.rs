//! Signing keys for service credentials
//!
//! A `SigningKeyProvider` hands out signing and verification capabilities
//! scoped to one call. Two providers exist:
//!
//! - `StaticSecretKey`: HMAC secret, constructible only with `APP_ENV=test`.
//!   It cannot verify; asking it to is a hard error.
//! - `DelegatedKey`: key held by a remote key service (AWS KMS in production).
//!   The verifier is rebuilt per call from the provider's own key path and
//!   is bounded by the call deadline.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use signing_keys::{token, SigningKeySettings};
//!
//! let provider = SigningKeySettings::from_env()?.build().await?;
//! let verifier = provider.verifier(&ctx)?;
//! let claims = token::verify(bearer, &verifier, &policy).await?;
//! ```

pub mod algorithm;
pub mod config;
pub mod error;
pub mod key_service;
pub mod provider;
pub mod token;

pub use algorithm::SigningAlgorithm;
pub use config::{Environment, ProviderSettings, SigningKeySettings};
pub use error::{KeyError, KeyServiceError};
pub use key_service::{AwsKmsKeyService, KeyService};
pub use provider::{DelegatedKey, Signer, SigningKeyProvider, StaticSecretKey, Verifier};
pub use token::{Claims, TokenError, TokenPolicy};
