//! User pool client over the identity service's JSON 1.1 protocol.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::Value;

use poolgate_core::config::Config;
use poolgate_core::{AwsCredentials, BackendError};

use crate::sigv4::{self, SigningError, SigningParams};
use crate::traits::{Action, IdentityBackend};

const SERVICE: &str = "cognito-idp";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Region used for the signing scope when only an endpoint is configured.
const FALLBACK_REGION: &str = "us-east-1";

/// Identity backend talking to a managed user pool.
pub struct UserPoolClient {
    client: Client,
    timeout: Duration,
    endpoint: String,
    region: String,
    credentials: Option<AwsCredentials>,
}

impl UserPoolClient {
    /// Client for the regional public endpoint.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        let region = region.into();
        let endpoint = format!("https://{SERVICE}.{region}.amazonaws.com/");
        Self::with_endpoint(region, endpoint)
    }

    /// Client for an explicit endpoint (emulators, tests).
    #[must_use]
    pub fn with_endpoint(region: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            timeout: DEFAULT_TIMEOUT,
            endpoint: endpoint.into(),
            region: region.into(),
            credentials: None,
        }
    }

    /// Client configured from the gateway configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let region = config
            .pool
            .region()
            .unwrap_or_else(|| FALLBACK_REGION.to_string());

        let client = match &config.backend.endpoint {
            Some(endpoint) => Self::with_endpoint(region, endpoint.clone()),
            None => Self::new(region),
        }
        .with_timeout(config.backend.timeout());

        match &config.backend.credentials {
            Some(credentials) => client.with_credentials(credentials.clone()),
            None => client,
        }
    }

    /// Sign requests with these credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Endpoint requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether requests are signed.
    #[must_use]
    pub const fn is_signed(&self) -> bool {
        self.credentials.is_some()
    }

    fn headers(&self, action: Action, body: &[u8]) -> Result<HeaderMap, SigningError> {
        let target = action.target();
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static(CONTENT_TYPE),
        );
        headers.insert(
            HeaderName::from_static("x-amz-target"),
            HeaderValue::from_str(&target).map_err(|_| SigningError::InvalidHeader("x-amz-target"))?,
        );

        let Some(credentials) = &self.credentials else {
            return Ok(headers);
        };

        let host = host_of(&self.endpoint);
        let params = SigningParams {
            credentials,
            region: &self.region,
            service: SERVICE,
            time: Utc::now(),
        };
        let signed = sigv4::sign(
            &params,
            "POST",
            "/",
            &[
                ("content-type", CONTENT_TYPE),
                ("host", host),
                ("x-amz-target", &target),
            ],
            body,
        )?;

        for (name, value) in signed {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_str(&value).map_err(|_| SigningError::InvalidHeader(name))?,
            );
        }
        Ok(headers)
    }
}

impl std::fmt::Debug for UserPoolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserPoolClient")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("signed", &self.is_signed())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IdentityBackend for UserPoolClient {
    fn name(&self) -> &str {
        "user-pool"
    }

    async fn call(&self, action: Action, request: Value) -> Result<Value, BackendError> {
        let body = serde_json::to_vec(&request)
            .map_err(|e| BackendError::new("SerializationException", e.to_string()))?;
        let headers = self
            .headers(action, &body)
            .map_err(|e| BackendError::new("SigningError", e.to_string()))?;

        tracing::debug!(action = %action, endpoint = %self.endpoint, "Calling user pool");

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| BackendError::networking(sanitize_reqwest_error(&e)))?;

        let status = response.status();
        let error_type = response
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::networking(sanitize_reqwest_error(&e)))?;

        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("Unknown Error");
            return Err(decode_error(error_type.as_deref(), &bytes, reason));
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            BackendError::new("MalformedResponse", format!("Invalid response body: {e}"))
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    message: Option<String>,
    #[serde(rename = "Message")]
    message_upper: Option<String>,
}

/// Build a `BackendError` from an error response.
///
/// The code comes from the `x-amzn-ErrorType` header or the body's
/// `__type`, with any `namespace#` prefix and `:uri` suffix removed. When
/// neither is present the HTTP reason phrase is used.
fn decode_error(header: Option<&str>, body: &[u8], reason: &str) -> BackendError {
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();

    let code = header
        .or(parsed.kind.as_deref())
        .map(normalize_code)
        .filter(|code| !code.is_empty())
        .unwrap_or(reason);
    let message = parsed
        .message
        .or(parsed.message_upper)
        .unwrap_or_else(|| reason.to_string());

    BackendError::new(code, message)
}

fn normalize_code(raw: &str) -> &str {
    let code = raw.split(':').next().unwrap_or(raw);
    code.rsplit('#').next().unwrap_or(code).trim()
}

fn host_of(endpoint: &str) -> &str {
    let rest = endpoint.split_once("://").map_or(endpoint, |(_, rest)| rest);
    rest.split('/').next().unwrap_or(rest)
}

fn sanitize_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "Request to the user pool timed out".to_string()
    } else if err.is_connect() {
        "Could not connect to the user pool".to_string()
    } else {
        "Request to the user pool failed".to_string()
    }
}
