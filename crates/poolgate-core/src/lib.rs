//! # poolgate core
//!
//! Authentication results and error taxonomy for the poolgate gateway.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format, env overrides)
//! - A single-flight cache of the user pool's public signing keys
//! - Access token verification against that cache
//! - Per-operation classification of backend errors into stable responses

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod classifier;
pub mod config;
pub mod error;
pub mod jwks;
pub mod secrets;
pub mod verifier;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use classifier::{Classifier, Operation, Reply, Rule};
pub use config::{Config, ConfigError};
pub use error::{BackendError, ClassifiedError};
pub use jwks::{
    HttpKeySource, KeyCache, KeyCacheError, KeySource, RawJwk, SigningKey, StaticKeySource,
};
pub use secrets::{AwsCredentials, SecretString};
pub use verifier::{RejectReason, TokenClaims, TokenVerifier, VerifyError};
