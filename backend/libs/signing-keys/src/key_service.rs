//! Remote key service seam
//!
//! The delegated provider never holds private key material; it asks a key
//! service to sign or verify. Production uses AWS KMS.

use crate::algorithm::SigningAlgorithm;
use crate::error::KeyServiceError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_kms::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::MessageType;
use aws_sdk_kms::Client as KmsClient;
use tracing::{debug, info};

/// Remote signing/verification authority
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyService: Send + Sync {
    async fn sign(
        &self,
        key_path: &str,
        algorithm: SigningAlgorithm,
        message: &[u8],
    ) -> Result<Vec<u8>, KeyServiceError>;

    /// `Ok(false)` means the key service answered and the signature is wrong
    async fn verify(
        &self,
        key_path: &str,
        algorithm: SigningAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, KeyServiceError>;
}

/// AWS KMS backed key service
#[derive(Clone)]
pub struct AwsKmsKeyService {
    client: KmsClient,
}

impl AwsKmsKeyService {
    /// Uses AWS credentials from the default provider chain (env, profile, IRSA)
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        info!(region = ?config.region(), "Initialized AWS KMS client");
        Self::new(KmsClient::new(&config))
    }

    pub fn new(client: KmsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeyService for AwsKmsKeyService {
    async fn sign(
        &self,
        key_path: &str,
        algorithm: SigningAlgorithm,
        message: &[u8],
    ) -> Result<Vec<u8>, KeyServiceError> {
        let spec = algorithm
            .kms_spec()
            .ok_or(KeyServiceError::Unsupported(algorithm))?;

        debug!(key_path = %key_path, algorithm = %algorithm, "Signing with KMS");

        let response = self
            .client
            .sign()
            .key_id(key_path)
            .message(Blob::new(message.to_vec()))
            .message_type(MessageType::Raw)
            .signing_algorithm(spec)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        response
            .signature()
            .map(|signature| signature.as_ref().to_vec())
            .ok_or_else(|| KeyServiceError::Internal("KMS returned no signature".to_string()))
    }

    async fn verify(
        &self,
        key_path: &str,
        algorithm: SigningAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, KeyServiceError> {
        let spec = algorithm
            .kms_spec()
            .ok_or(KeyServiceError::Unsupported(algorithm))?;

        debug!(key_path = %key_path, algorithm = %algorithm, "Verifying with KMS");

        let result = self
            .client
            .verify()
            .key_id(key_path)
            .message(Blob::new(message.to_vec()))
            .message_type(MessageType::Raw)
            .signature(Blob::new(signature.to_vec()))
            .signing_algorithm(spec)
            .send()
            .await;

        match result {
            Ok(response) => Ok(response.signature_valid()),
            // KMS reports a bad signature as an error, not as signature_valid=false.
            Err(SdkError::ServiceError(err)) if err.err().is_kms_invalid_signature_exception() => {
                Ok(false)
            }
            Err(err) => Err(classify_sdk_error(err)),
        }
    }
}

fn classify_sdk_error<E, R>(err: SdkError<E, R>) -> KeyServiceError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();

    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            KeyServiceError::Unreachable(message)
        }
        SdkError::ServiceError(service) => match service.err().code() {
            Some("DependencyTimeoutException") | Some("KeyUnavailableException") => {
                KeyServiceError::Unreachable(message)
            }
            Some("KMSInternalException") => KeyServiceError::Internal(message),
            Some(_) => KeyServiceError::Rejected(message),
            None => KeyServiceError::Unknown(message),
        },
        _ => KeyServiceError::Unknown(message),
    }
}
