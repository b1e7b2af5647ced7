//! Signing key configuration
//!
//! Loaded from environment variables:
//!
//! - `APP_ENV`: `production` | `staging` | `development` | `test` (default `production`)
//! - `SIGNING_KEY_PROVIDER`: `kms` (default) | `static`
//! - `SIGNING_KEY_PATH`: KMS key id, ARN or alias (required for `kms`)
//! - `SIGNING_ALGORITHM`: `RS256` (default) | `PS256`
//! - `STATIC_SIGNING_SECRET`: HMAC secret (required for `static`, test only)

use crate::algorithm::SigningAlgorithm;
use crate::key_service::{AwsKmsKeyService, KeyService};
use crate::provider::{DelegatedKey, SigningKeyProvider, StaticSecretKey};
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Staging,
    Development,
    Test,
}

impl Environment {
    pub fn from_env() -> Result<Self> {
        env::var("APP_ENV")
            .unwrap_or_else(|_| "production".to_string())
            .parse()
            .map_err(|e: String| anyhow!(e))
            .context("Invalid APP_ENV")
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Environment::Test)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Development => "development",
            Environment::Test => "test",
        })
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// Which provider to build, and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSettings {
    Kms {
        key_path: String,
        algorithm: SigningAlgorithm,
    },
    StaticSecret {
        secret: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKeySettings {
    pub environment: Environment,
    pub provider: ProviderSettings,
}

impl SigningKeySettings {
    pub fn from_env() -> Result<Self> {
        let environment = Environment::from_env()?;

        let provider = match env::var("SIGNING_KEY_PROVIDER")
            .unwrap_or_else(|_| "kms".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "kms" => ProviderSettings::Kms {
                key_path: env::var("SIGNING_KEY_PATH").context("SIGNING_KEY_PATH must be set")?,
                algorithm: env::var("SIGNING_ALGORITHM")
                    .unwrap_or_else(|_| "RS256".to_string())
                    .parse()
                    .map_err(|e: String| anyhow!(e))
                    .context("Invalid SIGNING_ALGORITHM")?,
            },
            "static" => {
                // Fail at startup, before anything reads the secret.
                if !environment.is_test() {
                    bail!("SIGNING_KEY_PROVIDER=static is test-only (APP_ENV={environment})");
                }
                ProviderSettings::StaticSecret {
                    secret: env::var("STATIC_SIGNING_SECRET")
                        .context("STATIC_SIGNING_SECRET must be set")?,
                }
            }
            other => bail!("Unknown SIGNING_KEY_PROVIDER: {other}"),
        };

        Ok(Self {
            environment,
            provider,
        })
    }

    /// Build the provider, connecting to AWS KMS when configured
    pub async fn build(&self) -> Result<SigningKeyProvider> {
        match &self.provider {
            ProviderSettings::Kms { .. } => {
                let service: Arc<dyn KeyService> = Arc::new(AwsKmsKeyService::from_env().await);
                self.build_with(service)
            }
            ProviderSettings::StaticSecret { .. } => self.build_with_static(),
        }
    }

    /// Build the provider against an explicit key service
    pub fn build_with(&self, service: Arc<dyn KeyService>) -> Result<SigningKeyProvider> {
        match &self.provider {
            ProviderSettings::Kms {
                key_path,
                algorithm,
            } => {
                let key = DelegatedKey::new(service, key_path.clone(), *algorithm)
                    .context("Invalid delegated key configuration")?;
                info!(key_path = %key_path, algorithm = %algorithm, "Using delegated signing key");
                Ok(SigningKeyProvider::Delegated(key))
            }
            ProviderSettings::StaticSecret { .. } => self.build_with_static(),
        }
    }

    fn build_with_static(&self) -> Result<SigningKeyProvider> {
        let ProviderSettings::StaticSecret { secret } = &self.provider else {
            bail!("Static secret requested for a non-static configuration");
        };
        warn!(environment = %self.environment, "Using static-secret signing key (test only)");
        let key = StaticSecretKey::new(secret.as_bytes(), self.environment)?;
        Ok(SigningKeyProvider::StaticSecret(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "APP_ENV",
            "SIGNING_KEY_PROVIDER",
            "SIGNING_KEY_PATH",
            "SIGNING_ALGORITHM",
            "STATIC_SIGNING_SECRET",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_kms_settings_from_env() {
        clear_env();
        env::set_var("SIGNING_KEY_PATH", "alias/switchboard-auth");
        env::set_var("SIGNING_ALGORITHM", "ps256");

        let settings = SigningKeySettings::from_env().unwrap();

        assert_eq!(settings.environment, Environment::Production);
        assert_eq!(
            settings.provider,
            ProviderSettings::Kms {
                key_path: "alias/switchboard-auth".to_string(),
                algorithm: SigningAlgorithm::Ps256,
            }
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_kms_requires_key_path() {
        clear_env();
        assert!(SigningKeySettings::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_static_provider_refused_outside_tests() {
        clear_env();
        env::set_var("APP_ENV", "production");
        env::set_var("SIGNING_KEY_PROVIDER", "static");
        env::set_var("STATIC_SIGNING_SECRET", "not-for-production");

        let err = SigningKeySettings::from_env().unwrap_err();
        assert!(err.to_string().contains("test-only"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_static_provider_in_test_environment() {
        clear_env();
        env::set_var("APP_ENV", "test");
        env::set_var("SIGNING_KEY_PROVIDER", "static");
        env::set_var("STATIC_SIGNING_SECRET", "unit-test-secret");

        let settings = SigningKeySettings::from_env().unwrap();
        let provider = settings.build_with_static().unwrap();
        assert_eq!(provider.name(), "static-secret");
        clear_env();
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("TEST".parse::<Environment>(), Ok(Environment::Test));
        assert_eq!("dev".parse::<Environment>(), Ok(Environment::Development));
        assert!("qa".parse::<Environment>().is_err());
    }
}
