//! CLI command implementations.

pub mod check_config;
pub mod serve;
pub mod validate_token;

pub use check_config::run_check_config;
pub use serve::run_serve;
pub use validate_token::run_validate_token;
