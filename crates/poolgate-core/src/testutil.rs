//! Test fixtures: RSA key pairs, key set entries and token builders.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};

use crate::jwks::{KeyCache, RawJwk, StaticKeySource};

/// Issuer used by fixture tokens.
pub const TEST_ISSUER: &str = "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_TestPool";

/// One of the bundled RSA-2048 test key pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKey {
    /// First key pair.
    K1,
    /// Second key pair.
    K2,
}

impl TestKey {
    const fn private_pem(self) -> &'static [u8] {
        match self {
            Self::K1 => include_bytes!("../testdata/rsa_k1.pem"),
            Self::K2 => include_bytes!("../testdata/rsa_k2.pem"),
        }
    }

    /// Base64url modulus of the public key.
    #[must_use]
    pub fn modulus(self) -> &'static str {
        match self {
            Self::K1 => include_str!("../testdata/rsa_k1.n").trim(),
            Self::K2 => include_str!("../testdata/rsa_k2.n").trim(),
        }
    }

    /// Private key for signing fixture tokens.
    ///
    /// # Panics
    ///
    /// Panics if the bundled PEM is unreadable.
    #[must_use]
    pub fn encoding_key(self) -> EncodingKey {
        EncodingKey::from_rsa_pem(self.private_pem()).expect("bundled test key is valid PEM")
    }
}

/// Public key set entry for a test key.
#[must_use]
pub fn jwk(kid: &str, key: TestKey) -> RawJwk {
    RawJwk {
        kid: Some(kid.to_string()),
        kty: "RSA".to_string(),
        n: key.modulus().to_string(),
        e: "AQAB".to_string(),
        alg: Some("RS256".to_string()),
        key_use: Some("sig".to_string()),
    }
}

/// Key cache serving the given `(kid, key)` pairs.
#[must_use]
pub fn static_cache(keys: &[(&str, TestKey)]) -> Arc<KeyCache> {
    let raw = keys.iter().map(|(kid, key)| jwk(kid, *key)).collect();
    Arc::new(KeyCache::new(Arc::new(StaticKeySource::new(raw))))
}

/// Seconds since the Unix epoch.
///
/// # Panics
///
/// Panics if the system clock is before 1970.
#[must_use]
pub fn now() -> i64 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs();
    i64::try_from(secs).expect("timestamp fits in i64")
}

/// Claims shaped like a user pool access token, valid for an hour.
#[must_use]
pub fn access_claims(issuer: &str) -> Value {
    let now = now();
    json!({
        "sub": "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee",
        "username": "jdoe",
        "cognito:groups": ["admins"],
        "event_id": "c0ffee",
        "token_use": "access",
        "scope": "aws.cognito.signin.user.admin",
        "auth_time": now,
        "iss": issuer,
        "exp": now + 3600,
        "iat": now,
        "jti": "5f9c1d2e-0000-4000-8000-000000000000",
        "client_id": "testclient",
    })
}

/// Sign `claims` with `key`, setting `kid` in the header when given.
///
/// # Panics
///
/// Panics if encoding fails.
#[must_use]
pub fn sign(claims: &Value, kid: Option<&str>, key: TestKey) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    encode(&header, claims, &key.encoding_key()).expect("fixture token encodes")
}
