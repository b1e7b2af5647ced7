use anyhow::{Context, Result};
use signing_keys::token::{TokenPolicy, DEFAULT_LEEWAY_SECONDS};
use std::env;

/// Procedures reachable without a credential unless overridden
pub const DEFAULT_PUBLIC_PROCEDURES: &[&str] = &[
    "/grpc.health.v1.Health/Check",
    "/grpc.health.v1.Health/Watch",
];

/// Token policy and public-procedure list for the authenticator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway_seconds: i64,
    pub public_procedures: Vec<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            issuer: None,
            audience: None,
            leeway_seconds: DEFAULT_LEEWAY_SECONDS,
            public_procedures: DEFAULT_PUBLIC_PROCEDURES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl AuthSettings {
    /// Load from `AUTH_*` environment variables (`.env` honoured in debug builds)
    pub fn from_env() -> Result<Self> {
        #[cfg(debug_assertions)]
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let leeway_seconds = match env::var("AUTH_LEEWAY_SECONDS") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .context("AUTH_LEEWAY_SECONDS must be an integer")?,
            Err(_) => defaults.leeway_seconds,
        };
        if leeway_seconds < 0 {
            anyhow::bail!("AUTH_LEEWAY_SECONDS must not be negative");
        }

        let public_procedures = env::var("AUTH_PUBLIC_PROCEDURES")
            .map(|raw| parse_list(&raw))
            .unwrap_or(defaults.public_procedures);

        Ok(Self {
            issuer: non_empty_var("AUTH_ISSUER"),
            audience: non_empty_var("AUTH_AUDIENCE"),
            leeway_seconds,
            public_procedures,
        })
    }

    pub fn policy(&self) -> TokenPolicy {
        TokenPolicy {
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            leeway_seconds: self.leeway_seconds,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
