//! AWS Signature Version 4 request signing.
//!
//! Only the subset needed for JSON POSTs to a regional endpoint: no query
//! string, no chunked payloads, no presigning.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;

use poolgate_core::AwsCredentials;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Signing errors.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The HMAC key was rejected.
    #[error("Invalid signing key")]
    InvalidKey,

    /// A computed header is not a valid HTTP header value.
    #[error("Invalid header value for {0}")]
    InvalidHeader(&'static str),
}

/// Inputs that scope a signature.
#[derive(Debug, Clone, Copy)]
pub struct SigningParams<'a> {
    /// Credentials to sign with.
    pub credentials: &'a AwsCredentials,
    /// Region of the endpoint.
    pub region: &'a str,
    /// Service signing name.
    pub service: &'a str,
    /// Request time.
    pub time: DateTime<Utc>,
}

impl SigningParams<'_> {
    fn amz_date(&self) -> String {
        self.time.format("%Y%m%dT%H%M%SZ").to_string()
    }

    fn short_date(&self) -> String {
        self.time.format("%Y%m%d").to_string()
    }

    fn scope(&self) -> String {
        format!(
            "{}/{}/{}/aws4_request",
            self.short_date(),
            self.region,
            self.service
        )
    }
}

/// Sign a request.
///
/// `headers` must include `host`. Returns the headers to add to the
/// request: `x-amz-date`, `x-amz-security-token` for session credentials,
/// and `authorization`.
///
/// # Errors
///
/// Returns error if the HMAC key cannot be constructed.
pub fn sign(
    params: &SigningParams<'_>,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    payload: &[u8],
) -> Result<Vec<(&'static str, String)>, SigningError> {
    let amz_date = params.amz_date();
    let session_token = params.credentials.session_token.as_ref().map(|t| t.expose());

    let mut canonical: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    canonical.push(("x-amz-date".to_string(), amz_date.clone()));
    if let Some(token) = session_token {
        canonical.push(("x-amz-security-token".to_string(), token.to_string()));
    }
    canonical.sort();

    let signed_headers = canonical
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let canonical_headers: String = canonical
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();

    let canonical_request = format!(
        "{method}\n{path}\n\n{canonical_headers}\n{signed_headers}\n{}",
        hex::encode(Sha256::digest(payload))
    );
    let scope = params.scope();
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key = signing_key(
        params.credentials.secret_access_key.expose(),
        &params.short_date(),
        params.region,
        params.service,
    )?;
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        params.credentials.access_key_id
    );

    let mut out = vec![("x-amz-date", amz_date)];
    if let Some(token) = session_token {
        out.push(("x-amz-security-token", token.to_string()));
    }
    out.push(("authorization", authorization));
    Ok(out)
}

/// Derive the per-day, per-region, per-service signing key.
///
/// # Errors
///
/// Returns error if the HMAC key cannot be constructed.
pub fn signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, SigningError> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SigningError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SigningError::InvalidKey)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    #[test]
    fn test_signing_key_derivation() {
        let key = signing_key(SECRET, "20120215", "us-east-1", "iam").unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_get_vanilla() {
        let credentials = AwsCredentials::new("AKIDEXAMPLE", SECRET);
        let params = SigningParams {
            credentials: &credentials,
            region: "us-east-1",
            service: "service",
            time: Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap(),
        };

        let headers = sign(&params, "GET", "/", &[("Host", "example.amazonaws.com")], b"").unwrap();

        assert_eq!(headers[0], ("x-amz-date", "20150830T123600Z".to_string()));
        assert_eq!(
            headers[1].1,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
    }

    #[test]
    fn test_session_token_is_signed() {
        let credentials = AwsCredentials::new("AKIDEXAMPLE", SECRET).with_session_token("tok");
        let params = SigningParams {
            credentials: &credentials,
            region: "us-east-1",
            service: "cognito-idp",
            time: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        };

        let headers = sign(&params, "POST", "/", &[("host", "h")], b"{}").unwrap();
        let names: Vec<_> = headers.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["x-amz-date", "x-amz-security-token", "authorization"]);
        assert!(headers[2].1.contains("SignedHeaders=host;x-amz-date;x-amz-security-token,"));
    }
}
