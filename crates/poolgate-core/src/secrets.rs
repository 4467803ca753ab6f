//! Secret values that must never reach logs.
//!
//! - `SecretString`: wrapper that redacts itself in `Debug`/`Display`
//! - `AwsCredentials`: signing credentials for the user-pool backend

use secrecy::{ExposeSecret, SecretBox};

/// String secret wrapper that prevents accidental logging.
///
/// The inner value is wrapped with `secrecy::SecretBox` so it is not
/// printed in logs or debug output.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    /// Wrap a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(value.into().into_boxed_str()))
    }

    /// Expose the secret for actual use.
    ///
    /// Use sparingly - only when signing a request.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Credentials used to sign admin calls to the user pool.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    /// Access key id (not secret, appears in the signature scope).
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: SecretString,
    /// Session token for temporary credentials.
    pub session_token: Option<SecretString>,
}

impl AwsCredentials {
    /// Create long-lived credentials.
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::new(secret_access_key),
            session_token: None,
        }
    }

    /// Attach a session token.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(SecretString::new(token));
        self
    }

    /// Read credentials from the standard `AWS_*` environment variables.
    ///
    /// Returns `None` unless both the key id and the secret are set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
        let secret = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
        let credentials = Self::new(access_key_id, secret);

        Some(match std::env::var("AWS_SESSION_TOKEN") {
            Ok(token) if !token.is_empty() => credentials.with_session_token(token),
            _ => credentials,
        })
    }
}
