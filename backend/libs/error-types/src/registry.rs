//! Detail-type registry keyed by domain error id
//!
//! Decoding an envelope looks the carried id up here instead of inspecting
//! payload types dynamically. `DetailRegistry::standard()` is derived from the
//! kinds' declared schemas; `verify_complete` is the startup check for
//! registries assembled by hand.

use crate::detail::{DetailSchema, ErrorDetail};
use crate::kind::ErrorKind;
use once_cell::sync::Lazy;
use prost_types::Any;
use std::collections::HashMap;
use thiserror::Error;

static STANDARD: Lazy<DetailRegistry> = Lazy::new(|| {
    let mut registry = DetailRegistry::empty();
    for kind in ErrorKind::ALL {
        if let Some(schema) = kind.detail_schema() {
            registry.register(kind, schema);
        }
    }
    registry
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no detail codec registered for {0}")]
    MissingCodec(ErrorKind),
}

#[derive(Debug, Error)]
pub enum DetailDecodeError {
    #[error("{kind} does not carry structured detail")]
    NoSchema { kind: ErrorKind },

    #[error("detail type {actual} does not match {expected} declared by {kind}")]
    TypeMismatch {
        kind: ErrorKind,
        expected: &'static str,
        actual: String,
    },

    #[error("malformed {type_url} payload: {source}")]
    Malformed {
        type_url: &'static str,
        #[source]
        source: prost::DecodeError,
    },
}

#[derive(Debug, Clone)]
pub struct DetailRegistry {
    codecs: HashMap<i32, DetailSchema>,
}

impl DetailRegistry {
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Registry covering every kind that declares a detail schema
    pub fn standard() -> &'static DetailRegistry {
        &STANDARD
    }

    /// Register the decoder for `kind`
    ///
    /// # Panics
    ///
    /// Registering a schema the kind does not declare is a programming error
    /// and panics immediately.
    pub fn register(&mut self, kind: ErrorKind, schema: DetailSchema) {
        assert_eq!(
            kind.detail_schema(),
            Some(schema),
            "{kind} does not declare detail schema {schema:?}"
        );
        self.codecs.insert(kind.id(), schema);
    }

    /// Every kind that declares a schema must have a codec
    pub fn verify_complete(&self) -> Result<(), RegistryError> {
        for kind in ErrorKind::ALL {
            if kind.detail_schema().is_some() && !self.codecs.contains_key(&kind.id()) {
                return Err(RegistryError::MissingCodec(kind));
            }
        }
        Ok(())
    }

    pub fn decode(&self, kind: ErrorKind, any: &Any) -> Result<ErrorDetail, DetailDecodeError> {
        let schema = self
            .codecs
            .get(&kind.id())
            .ok_or(DetailDecodeError::NoSchema { kind })?;

        if any.type_url != schema.type_url() {
            return Err(DetailDecodeError::TypeMismatch {
                kind,
                expected: schema.type_url(),
                actual: any.type_url.clone(),
            });
        }

        schema
            .decode(&any.value)
            .map_err(|source| DetailDecodeError::Malformed {
                type_url: schema.type_url(),
                source,
            })
    }
}
