//! # poolgate backend
//!
//! Client for the managed user-pool identity service.
//!
//! The gateway talks to the identity service only through the
//! [`IdentityBackend`] trait. [`UserPoolClient`] implements it over the
//! service's JSON 1.1 wire protocol, signing requests with AWS Signature V4
//! when credentials are configured.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sigv4;
pub mod traits;
mod user_pool;

pub use sigv4::{SigningError, SigningParams};
pub use traits::{Action, IdentityBackend};
pub use user_pool::UserPoolClient;
