//! Configuration loading and validation.
//!
//! Config is read once at process start: a JSON5 file (optional), then
//! environment overrides. Location: `~/.poolgate/poolgate.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::secrets::AwsCredentials;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP listener configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// User pool the gateway fronts.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Backend client configuration.
    #[serde(default)]
    pub backend: BackendConfig,
}

impl Config {
    /// Create a new config builder.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load, override from the environment and validate.
    ///
    /// Uses `path` when given, the default location otherwise. A missing
    /// default file is not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be parsed or the result is invalid.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::load_default()?,
        };
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from JSON5 text.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid JSON5 for this schema.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(json5::from_str(content)?)
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("poolgate.json")
    }

    /// Get the poolgate state directory.
    ///
    /// Uses `POOLGATE_STATE_DIR` env var if set, otherwise `~/.poolgate`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("POOLGATE_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".poolgate")
        } else {
            PathBuf::from(".poolgate")
        }
    }

    /// Apply overrides from process environment variables.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        let mut config = self.with_overrides_from(|key| std::env::var(key).ok());
        if config.backend.credentials.is_none() {
            config.backend.credentials = AwsCredentials::from_env();
        }
        config
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Recognised keys: `ISS`, `USER_POOL_ID`, `CLIENT_ID`, `AWS_REGION`,
    /// `POOLGATE_BACKEND_ENDPOINT`, `POOLGATE_PORT`, `POOLGATE_BIND`.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(issuer) = lookup("ISS") {
            self.pool.issuer = issuer;
        }
        if let Some(pool_id) = lookup("USER_POOL_ID") {
            self.pool.user_pool_id = pool_id;
        }
        if let Some(client_id) = lookup("CLIENT_ID") {
            self.pool.client_id = client_id;
        }
        if let Some(region) = lookup("AWS_REGION") {
            self.pool.region = Some(region);
        }
        if let Some(endpoint) = lookup("POOLGATE_BACKEND_ENDPOINT") {
            self.backend.endpoint = Some(endpoint);
        }
        if let Some(port) = lookup("POOLGATE_PORT").and_then(|p| p.parse().ok()) {
            self.gateway.port = port;
        }
        if let Some(bind) = lookup("POOLGATE_BIND") {
            self.gateway.bind_address = bind;
        }
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if a required pool setting is missing or a value is
    /// out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::Validation(
                "Gateway port cannot be 0".to_string(),
            ));
        }

        if self.pool.user_pool_id.is_empty() {
            return Err(ConfigError::MissingField("pool.userPoolId".to_string()));
        }
        if self.pool.client_id.is_empty() {
            return Err(ConfigError::MissingField("pool.clientId".to_string()));
        }
        if self.pool.issuer().is_none() {
            return Err(ConfigError::MissingField("pool.issuer".to_string()));
        }
        if self.pool.region().is_none() && self.backend.endpoint.is_none() {
            return Err(ConfigError::Validation(format!(
                "Cannot derive region from user pool id '{}'; set pool.region",
                self.pool.user_pool_id
            )));
        }

        Ok(())
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Enable permissive CORS.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Maximum accepted request body in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            cors: true,
            body_limit_bytes: default_body_limit(),
        }
    }
}

const fn default_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_body_limit() -> usize {
    50 * 1024 * 1024
}

/// User pool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    /// Token issuer URL. Derived from region and pool id when empty.
    #[serde(default)]
    pub issuer: String,

    /// User pool identifier (`<region>_<id>`).
    #[serde(default)]
    pub user_pool_id: String,

    /// App client identifier.
    #[serde(default)]
    pub client_id: String,

    /// Region of the pool. Derived from the pool id when unset.
    #[serde(default)]
    pub region: Option<String>,

    /// Allowed clock skew for `exp` checks, in seconds.
    #[serde(default)]
    pub clock_skew_secs: u64,
}

impl PoolConfig {
    /// Region of the pool, explicit or taken from the pool id prefix.
    #[must_use]
    pub fn region(&self) -> Option<String> {
        if let Some(region) = self.region.as_ref().filter(|r| !r.is_empty()) {
            return Some(region.clone());
        }
        self.user_pool_id
            .split_once('_')
            .map(|(region, _)| region)
            .filter(|region| !region.is_empty())
            .map(str::to_string)
    }

    /// Issuer expected in every accepted token.
    #[must_use]
    pub fn issuer(&self) -> Option<String> {
        if !self.issuer.is_empty() {
            return Some(self.issuer.clone());
        }
        if self.user_pool_id.is_empty() {
            return None;
        }
        self.region().map(|region| {
            format!(
                "https://cognito-idp.{region}.amazonaws.com/{}",
                self.user_pool_id
            )
        })
    }

    /// Well-known key set location for an issuer.
    #[must_use]
    pub fn jwks_url(issuer: &str) -> String {
        format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'))
    }

    /// Clock skew as a duration.
    #[must_use]
    pub const fn clock_skew(&self) -> Duration {
        Duration::from_secs(self.clock_skew_secs)
    }
}

/// Backend client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Endpoint override (local emulators, tests).
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Signing credentials, environment only.
    #[serde(skip)]
    pub credentials: Option<AwsCredentials>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_timeout(),
            credentials: None,
        }
    }
}

impl BackendConfig {
    /// Request timeout as a duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

const fn default_timeout() -> u64 {
    30
}

/// Builder for `Config`.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the token issuer.
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.config.pool.issuer = issuer.into();
        self
    }

    /// Set the user pool id.
    #[must_use]
    pub fn user_pool_id(mut self, id: impl Into<String>) -> Self {
        self.config.pool.user_pool_id = id.into();
        self
    }

    /// Set the app client id.
    #[must_use]
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.config.pool.client_id = id.into();
        self
    }

    /// Set the pool region.
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.pool.region = Some(region.into());
        self
    }

    /// Set the backend endpoint override.
    #[must_use]
    pub fn backend_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.backend.endpoint = Some(endpoint.into());
        self
    }

    /// Set signing credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: AwsCredentials) -> Self {
        self.config.backend.credentials = Some(credentials);
        self
    }

    /// Set the listen port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.gateway.port = port;
        self
    }

    /// Set whether CORS is enabled.
    #[must_use]
    pub const fn cors(mut self, cors: bool) -> Self {
        self.config.gateway.cors = cors;
        self
    }

    /// Build the config.
    #[must_use]
    pub fn build(self) -> Config {
        self.config
    }
}
