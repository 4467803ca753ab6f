//! # poolgate gateway
//!
//! HTTP front door for a managed user pool: user lifecycle and login
//! operations forwarded to the identity backend, plus access token
//! validation against the pool's published signing keys.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod extract;
pub mod operations;
pub mod response;
mod routes;
mod server;

#[cfg(test)]
mod mock;

pub use operations::AuthOperations;
pub use response::{ApiError, ApiResponse};
pub use server::{Gateway, GatewayBuilder, GatewayState};

use poolgate_core::Config;

/// Build and run a gateway for `config` until the server stops.
///
/// # Errors
///
/// Returns error if the gateway cannot be built or the server fails.
pub async fn start(config: Config) -> Result<(), GatewayError> {
    let gateway = GatewayBuilder::new().with_config(config).build()?;
    gateway.run().await
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
