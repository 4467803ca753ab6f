//! Signing key cache.
//!
//! Fetches the user pool's JSON Web Key Set once, converts every RSA entry
//! into a verification key and serves later lookups from memory.
//!
//! ```text
//! get_key(kid) → populated? ── yes ──→ lookup
//!                    │
//!                    no → single fetch from {issuer}/.well-known/jwks.json
//!                         (concurrent callers wait on the same fetch)
//! ```
//!
//! A failed fetch is returned to the caller and not remembered; the next
//! lookup fetches again.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::config::PoolConfig;

/// Maximum key set response size in bytes (1 MB).
const JWKS_MAX_RESPONSE_SIZE: usize = 1_048_576;

/// HTTP request timeout for the key set endpoint.
const JWKS_TIMEOUT: Duration = Duration::from_secs(10);

/// Key cache errors.
#[derive(Debug, Clone, Error)]
pub enum KeyCacheError {
    /// The key set could not be fetched or parsed.
    #[error("Failed to fetch signing keys from {url}: {reason}")]
    Fetch {
        /// Key set location.
        url: String,
        /// Sanitized failure reason.
        reason: String,
    },

    /// A single key could not be converted.
    #[error("Invalid signing key '{kid}': {reason}")]
    InvalidKey {
        /// Key identifier.
        kid: String,
        /// Conversion failure reason.
        reason: String,
    },
}

/// A key set entry as published by the user pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawJwk {
    /// Key identifier. Entries without one cannot be selected by a token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Key type (`RSA`).
    pub kty: String,
    /// Base64url modulus.
    #[serde(default)]
    pub n: String,
    /// Base64url public exponent.
    #[serde(default)]
    pub e: String,
    /// Signing algorithm, `RS256` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Intended key use (`sig`).
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwkDocument {
    keys: Vec<RawJwk>,
}

/// A verification-ready public key.
pub struct SigningKey {
    key_id: String,
    algorithm: Algorithm,
    decoding_key: DecodingKey,
}

impl SigningKey {
    /// Convert a published key set entry.
    ///
    /// # Errors
    ///
    /// Returns error for entries without a key identifier, non-RSA keys,
    /// non-RSA algorithms or malformed modulus/exponent.
    pub fn from_jwk(jwk: &RawJwk) -> Result<Self, KeyCacheError> {
        let Some(kid) = jwk.kid.as_deref() else {
            return Err(KeyCacheError::InvalidKey {
                kid: String::new(),
                reason: "missing key identifier".to_string(),
            });
        };
        let invalid = |reason: String| KeyCacheError::InvalidKey {
            kid: kid.to_string(),
            reason,
        };

        if jwk.kty != "RSA" {
            return Err(invalid(format!("unsupported key type '{}'", jwk.kty)));
        }

        let algorithm = match jwk.alg.as_deref() {
            Some(alg) => Algorithm::from_str(alg)
                .map_err(|_| invalid(format!("unknown algorithm '{alg}'")))?,
            None => Algorithm::RS256,
        };
        if !matches!(
            algorithm,
            Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512
        ) {
            return Err(invalid(format!("algorithm {algorithm:?} is not an RSA algorithm")));
        }

        let decoding_key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| invalid(format!("bad RSA components: {e}")))?;

        Ok(Self {
            key_id: kid.to_string(),
            algorithm,
            decoding_key,
        })
    }

    /// Key identifier.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Algorithm tokens signed with this key must use.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Key for signature verification.
    #[must_use]
    pub const fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Where the key set comes from.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Fetch the full key set.
    async fn fetch(&self) -> Result<Vec<RawJwk>, KeyCacheError>;
}

/// Key set served over HTTPS from the issuer's well-known location.
pub struct HttpKeySource {
    client: reqwest::Client,
    url: String,
}

impl HttpKeySource {
    /// Source for `{issuer}/.well-known/jwks.json`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn for_issuer(issuer: &str) -> Result<Self, KeyCacheError> {
        Self::with_url(PoolConfig::jwks_url(issuer))
    }

    /// Source for an explicit key set URL.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn with_url(url: impl Into<String>) -> Result<Self, KeyCacheError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(JWKS_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| KeyCacheError::Fetch {
                url: url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, url })
    }

    /// Key set URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn fetch_error(&self, reason: impl Into<String>) -> KeyCacheError {
        KeyCacheError::Fetch {
            url: self.url.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self) -> Result<Vec<RawJwk>, KeyCacheError> {
        tracing::debug!(url = %self.url, "Fetching signing keys");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.fetch_error(sanitize_reqwest_error(&e)))?;

        if !response.status().is_success() {
            return Err(self.fetch_error(format!(
                "server returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|_| self.fetch_error("failed to read response body"))?;
        if body.len() > JWKS_MAX_RESPONSE_SIZE {
            return Err(self.fetch_error(format!(
                "response exceeds maximum size of {JWKS_MAX_RESPONSE_SIZE} bytes"
            )));
        }

        let document: JwkDocument = serde_json::from_slice(&body)
            .map_err(|_| self.fetch_error("response is not a valid JWKS document"))?;
        Ok(document.keys)
    }
}

/// Fixed, in-memory key set.
#[derive(Debug, Clone, Default)]
pub struct StaticKeySource {
    keys: Vec<RawJwk>,
}

impl StaticKeySource {
    /// Serve the given keys.
    #[must_use]
    pub const fn new(keys: Vec<RawJwk>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn fetch(&self) -> Result<Vec<RawJwk>, KeyCacheError> {
        Ok(self.keys.clone())
    }
}

type KeyMap = HashMap<String, Arc<SigningKey>>;

/// Process-wide signing key cache.
///
/// Populated once, on first use. Concurrent first callers share a single
/// fetch and observe the same key set.
pub struct KeyCache {
    source: Arc<dyn KeySource>,
    keys: OnceCell<KeyMap>,
    fetches: AtomicU64,
}

impl KeyCache {
    /// Cache backed by an arbitrary source.
    #[must_use]
    pub fn new(source: Arc<dyn KeySource>) -> Self {
        Self {
            source,
            keys: OnceCell::new(),
            fetches: AtomicU64::new(0),
        }
    }

    /// Cache backed by the issuer's well-known key set.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn for_issuer(issuer: &str) -> Result<Self, KeyCacheError> {
        Ok(Self::new(Arc::new(HttpKeySource::for_issuer(issuer)?)))
    }

    /// Cache pre-populated from an already known key set.
    ///
    /// # Errors
    ///
    /// Returns error if no entry is usable.
    pub fn from_keys(raw: &[RawJwk]) -> Result<Self, KeyCacheError> {
        let keys = build_key_map(raw)?;
        Ok(Self {
            source: Arc::new(StaticKeySource::new(raw.to_vec())),
            keys: OnceCell::new_with(Some(keys)),
            fetches: AtomicU64::new(0),
        })
    }

    /// Resolve a key by identifier, populating the cache if needed.
    ///
    /// `Ok(None)` means the key set does not contain `kid`.
    ///
    /// # Errors
    ///
    /// Returns error if the cache is empty and the fetch fails.
    pub async fn get_key(&self, kid: &str) -> Result<Option<Arc<SigningKey>>, KeyCacheError> {
        let keys = self.populate().await?;
        Ok(keys.get(kid).cloned())
    }

    /// Populate the cache if it is empty.
    ///
    /// # Errors
    ///
    /// Returns error if the fetch fails or yields no usable key.
    pub async fn populate(&self) -> Result<&HashMap<String, Arc<SigningKey>>, KeyCacheError> {
        self.keys
            .get_or_try_init(|| async {
                self.fetches.fetch_add(1, Ordering::Relaxed);
                let raw = self.source.fetch().await?;
                let keys = build_key_map(&raw)?;
                tracing::debug!(keys = keys.len(), "Signing key cache populated");
                Ok::<_, KeyCacheError>(keys)
            })
            .await
    }

    /// Whether the key set has been loaded.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.keys.initialized()
    }

    /// Number of cached keys (0 before population).
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.get().map_or(0, HashMap::len)
    }

    /// Whether no key is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of fetch attempts made so far.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache")
            .field("populated", &self.is_populated())
            .field("keys", &self.len())
            .field("fetches", &self.fetch_count())
            .finish_non_exhaustive()
    }
}

fn build_key_map(raw: &[RawJwk]) -> Result<KeyMap, KeyCacheError> {
    let mut keys = KeyMap::with_capacity(raw.len());

    for jwk in raw {
        match SigningKey::from_jwk(jwk) {
            Ok(key) => {
                keys.insert(key.key_id().to_string(), Arc::new(key));
            }
            Err(e) => tracing::warn!(error = %e, "Skipping signing key"),
        }
    }

    if keys.is_empty() {
        return Err(KeyCacheError::Fetch {
            url: String::new(),
            reason: "key set contains no usable keys".to_string(),
        });
    }

    Ok(keys)
}

/// Map a `reqwest` error to a generic reason string.
fn sanitize_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "connection timed out".to_string()
    } else if err.is_connect() {
        "failed to connect to server".to_string()
    } else if err.is_redirect() {
        "redirects are not followed".to_string()
    } else {
        "request failed".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{TestKey, jwk};
    use std::sync::atomic::AtomicUsize;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Source that counts calls, optionally slow, optionally failing first.
    struct CountingSource {
        keys: Vec<RawJwk>,
        calls: AtomicUsize,
        delay: Duration,
        fail_first: usize,
    }

    impl CountingSource {
        fn new(keys: Vec<RawJwk>) -> Self {
            Self {
                keys,
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail_first: 0,
            }
        }
    }

    #[async_trait]
    impl KeySource for CountingSource {
        async fn fetch(&self) -> Result<Vec<RawJwk>, KeyCacheError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if call < self.fail_first {
                return Err(KeyCacheError::Fetch {
                    url: "test".to_string(),
                    reason: "unavailable".to_string(),
                });
            }
            Ok(self.keys.clone())
        }
    }

    #[tokio::test]
    async fn test_first_call_fetches_once() {
        let source = Arc::new(CountingSource::new(vec![jwk("k1", TestKey::K1)]));
        let cache = KeyCache::new(source.clone());

        assert!(!cache.is_populated());
        assert!(cache.get_key("k1").await.unwrap().is_some());
        assert!(cache.get_key("k1").await.unwrap().is_some());
        assert!(cache.get_key("other").await.unwrap().is_none());

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_share_one_fetch() {
        let mut source = CountingSource::new(vec![jwk("k1", TestKey::K1)]);
        source.delay = Duration::from_millis(50);
        let source = Arc::new(source);
        let cache = Arc::new(KeyCache::new(source.clone()));

        let lookups = (0..16).map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_key("k1").await })
        });
        let results = futures::future::join_all(lookups).await;

        for result in results {
            let key = result.unwrap().unwrap().unwrap();
            assert_eq!(key.key_id(), "k1");
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_keys_retained() {
        let source = Arc::new(CountingSource::new(vec![
            jwk("k1", TestKey::K1),
            jwk("k2", TestKey::K2),
        ]));
        let cache = KeyCache::new(source);

        assert!(cache.get_key("k1").await.unwrap().is_some());
        assert!(cache.get_key("k2").await.unwrap().is_some());
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_not_cached() {
        let mut source = CountingSource::new(vec![jwk("k1", TestKey::K1)]);
        source.fail_first = 1;
        let source = Arc::new(source);
        let cache = KeyCache::new(source.clone());

        assert!(matches!(
            cache.get_key("k1").await,
            Err(KeyCacheError::Fetch { .. })
        ));
        assert!(!cache.is_populated());

        assert!(cache.get_key("k1").await.unwrap().is_some());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unusable_keys_skipped() {
        let ec_key = RawJwk {
            kid: Some("ec".to_string()),
            kty: "EC".to_string(),
            n: String::new(),
            e: String::new(),
            alg: Some("ES256".to_string()),
            key_use: None,
        };
        let cache = KeyCache::new(Arc::new(StaticKeySource::new(vec![
            ec_key,
            jwk("k1", TestKey::K1),
        ])));

        assert!(cache.get_key("ec").await.unwrap().is_none());
        assert!(cache.get_key("k1").await.unwrap().is_some());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_key_set_is_an_error() {
        let cache = KeyCache::new(Arc::new(StaticKeySource::default()));
        assert!(cache.get_key("k1").await.is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_from_keys_is_prepopulated() {
        let cache = KeyCache::from_keys(&[jwk("k1", TestKey::K1)]).unwrap();
        assert!(cache.is_populated());
        assert!(cache.get_key("k1").await.unwrap().is_some());
        assert_eq!(cache.fetch_count(), 0);

        assert!(KeyCache::from_keys(&[]).is_err());
    }

    #[test]
    fn test_signing_key_algorithm() {
        let mut raw = jwk("k1", TestKey::K1);
        assert_eq!(SigningKey::from_jwk(&raw).unwrap().algorithm(), Algorithm::RS256);

        raw.alg = None;
        assert_eq!(SigningKey::from_jwk(&raw).unwrap().algorithm(), Algorithm::RS256);

        raw.alg = Some("HS256".to_string());
        assert!(matches!(
            SigningKey::from_jwk(&raw),
            Err(KeyCacheError::InvalidKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_http_source_reads_well_known_document() {
        let server = MockServer::start().await;
        let issuer = format!("{}/us-east-1_TestPool", server.uri());
        let body = serde_json::json!({
            "keys": [jwk("k1", TestKey::K1), jwk("k2", TestKey::K2)]
        });

        Mock::given(method("GET"))
            .and(path("/us-east-1_TestPool/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let cache = KeyCache::for_issuer(&issuer).unwrap();
        assert!(cache.get_key("k2").await.unwrap().is_some());
        assert!(cache.get_key("k1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_http_source_rejects_bad_documents() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/broken/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/down/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let broken = HttpKeySource::for_issuer(&format!("{}/broken", server.uri())).unwrap();
        let err = broken.fetch().await.unwrap_err();
        assert!(err.to_string().contains("not a valid JWKS document"));

        let down = HttpKeySource::for_issuer(&format!("{}/down", server.uri())).unwrap();
        let err = down.fetch().await.unwrap_err();
        assert!(err.to_string().contains("HTTP 503"));
    }

    #[test]
    fn test_entry_without_kid_is_invalid() {
        let mut raw = jwk("k1", TestKey::K1);
        raw.kid = None;
        assert!(matches!(
            SigningKey::from_jwk(&raw),
            Err(KeyCacheError::InvalidKey { ref reason, .. }) if reason == "missing key identifier"
        ));
    }

    #[tokio::test]
    async fn test_http_source_skips_entries_without_kid() {
        let server = MockServer::start().await;
        let issuer = format!("{}/us-east-1_TestPool", server.uri());
        let body = serde_json::json!({
            "keys": [
                {"kty": "RSA", "n": "AQAB", "e": "AQAB"},
                jwk("k1", TestKey::K1)
            ]
        });

        Mock::given(method("GET"))
            .and(path("/us-east-1_TestPool/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let cache = KeyCache::for_issuer(&issuer).unwrap();
        let key = cache.get_key("k1").await.unwrap().unwrap();
        assert_eq!(key.key_id(), "k1");
        assert_eq!(cache.len(), 1);
    }
}
