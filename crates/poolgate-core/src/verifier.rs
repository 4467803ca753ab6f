//! Access token verification.
//!
//! A token is accepted only when it is a well-formed JWT, was issued by the
//! configured user pool, is an access token, names a known signing key and
//! carries a valid signature and expiry. Structural and claim checks run
//! before the key cache is consulted.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::jwks::{KeyCache, KeyCacheError};

/// Claims removed from a verified token before it is returned.
pub const INTERNAL_CLAIMS: [&str; 6] = ["token_use", "scope", "iss", "iat", "jti", "client_id"];

/// Why a token was rejected. Only ever logged; callers see a uniform answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Not a decodable JWT.
    NotAJwt,
    /// `iss` does not match the configured issuer.
    InvalidIssuer,
    /// `token_use` is not `access`.
    WrongTokenClass,
    /// Header `kid` missing or not in the key set.
    InvalidKid,
    /// Signature, issuer or expiry check failed.
    VerificationFailed,
}

impl RejectReason {
    /// Stable identifier for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotAJwt => "not_a_jwt",
            Self::InvalidIssuer => "invalid_issuer",
            Self::WrongTokenClass => "wrong_token_class",
            Self::InvalidKid => "invalid_kid",
            Self::VerificationFailed => "verification_failed",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token verification errors.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The token is not acceptable.
    #[error("Not authorized ({0})")]
    Rejected(RejectReason),

    /// Signing keys could not be loaded.
    #[error(transparent)]
    KeyFetch(#[from] KeyCacheError),
}

impl VerifyError {
    /// Whether this is a token rejection rather than an infrastructure failure.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Payload of a verified access token, internal claims removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenClaims(Map<String, Value>);

impl TokenClaims {
    /// Look up a claim.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// `sub` claim.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.get("sub").and_then(Value::as_str)
    }

    /// `username` claim.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.get("username").and_then(Value::as_str)
    }

    /// `exp` claim (seconds since epoch).
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        self.get("exp").and_then(Value::as_i64)
    }

    /// Borrow all claims.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Take all claims.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Verifies access tokens issued by one user pool.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    issuer: String,
    keys: Arc<KeyCache>,
    leeway: Duration,
}

impl TokenVerifier {
    /// Verifier for `issuer`, resolving keys through `keys`.
    #[must_use]
    pub fn new(issuer: impl Into<String>, keys: Arc<KeyCache>) -> Self {
        Self {
            issuer: issuer.into(),
            keys,
            leeway: Duration::ZERO,
        }
    }

    /// Allow this much clock skew on expiry.
    #[must_use]
    pub const fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Configured issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Underlying key cache.
    #[must_use]
    pub const fn key_cache(&self) -> &Arc<KeyCache> {
        &self.keys
    }

    /// Verify `token` and return its public claims.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` for any unacceptable token and `KeyFetch` when the
    /// key set cannot be loaded.
    pub async fn verify(&self, token: &str) -> Result<TokenClaims, VerifyError> {
        let header = decode_header(token).map_err(|_| reject(RejectReason::NotAJwt))?;
        let unverified = decode_unverified(token).ok_or_else(|| reject(RejectReason::NotAJwt))?;

        if unverified.get("iss").and_then(Value::as_str) != Some(self.issuer.as_str()) {
            return Err(reject(RejectReason::InvalidIssuer));
        }
        if unverified.get("token_use").and_then(Value::as_str) != Some("access") {
            return Err(reject(RejectReason::WrongTokenClass));
        }

        let kid = header.kid.ok_or_else(|| reject(RejectReason::InvalidKid))?;
        let key = self
            .keys
            .get_key(&kid)
            .await?
            .ok_or_else(|| reject(RejectReason::InvalidKid))?;

        let mut validation = Validation::new(key.algorithm());
        validation.set_issuer(&[&self.issuer]);
        validation.validate_aud = false;
        validation.leeway = self.leeway.as_secs();

        let verified = decode::<Map<String, Value>>(token, key.decoding_key(), &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, kid = %kid, "Token signature check failed");
                reject(RejectReason::VerificationFailed)
            })?;

        let mut claims = verified.claims;
        for name in INTERNAL_CLAIMS {
            claims.remove(name);
        }
        Ok(TokenClaims(claims))
    }

    /// Extract the token from an `Authorization: Bearer <token>` value.
    #[must_use]
    pub fn extract_bearer(header: &str) -> Option<&str> {
        let (scheme, token) = header.split_once(' ')?;
        let token = token.trim();
        (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
    }
}

fn reject(reason: RejectReason) -> VerifyError {
    tracing::warn!(reason = %reason, "Token rejected");
    VerifyError::Rejected(reason)
}

/// Decode the payload without checking signature or expiry.
fn decode_unverified(token: &str) -> Option<Map<String, Value>> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Map<String, Value>>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims)
}
