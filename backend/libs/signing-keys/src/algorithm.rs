use aws_sdk_kms::types::SigningAlgorithmSpec;
use std::fmt;
use std::str::FromStr;

/// Signature algorithms understood by the providers
///
/// HS256 is only produced by the static-secret provider. Delegated keys are
/// RSA keys held by the key service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    Hs256,
    Rs256,
    Ps256,
}

impl SigningAlgorithm {
    /// Value of the token header `alg` field
    pub fn jwt_name(&self) -> &'static str {
        match self {
            SigningAlgorithm::Hs256 => "HS256",
            SigningAlgorithm::Rs256 => "RS256",
            SigningAlgorithm::Ps256 => "PS256",
        }
    }

    pub(crate) fn kms_spec(&self) -> Option<SigningAlgorithmSpec> {
        match self {
            SigningAlgorithm::Hs256 => None,
            SigningAlgorithm::Rs256 => Some(SigningAlgorithmSpec::RsassaPkcs1V15Sha256),
            SigningAlgorithm::Ps256 => Some(SigningAlgorithmSpec::RsassaPssSha256),
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.jwt_name())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HS256" => Ok(SigningAlgorithm::Hs256),
            "RS256" => Ok(SigningAlgorithm::Rs256),
            "PS256" => Ok(SigningAlgorithm::Ps256),
            other => Err(format!("unsupported signing algorithm: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("rs256".parse::<SigningAlgorithm>(), Ok(SigningAlgorithm::Rs256));
        assert_eq!(" PS256 ".parse::<SigningAlgorithm>(), Ok(SigningAlgorithm::Ps256));
        assert!("ES256".parse::<SigningAlgorithm>().is_err());
    }

    #[test]
    fn test_only_asymmetric_algorithms_map_to_kms() {
        assert!(SigningAlgorithm::Hs256.kms_spec().is_none());
        assert_eq!(
            SigningAlgorithm::Rs256.kms_spec(),
            Some(SigningAlgorithmSpec::RsassaPkcs1V15Sha256)
        );
    }
}
