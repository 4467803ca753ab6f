//! Validate-token command - check an access token against the pool.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use poolgate_core::{Config, KeyCache, TokenVerifier, VerifyError};

use crate::ui;

/// Verify `token` and print its public claims.
pub async fn run_validate_token(token: &str, config_path: Option<PathBuf>) -> Result<()> {
    let config = Config::resolve(config_path.as_deref()).context("Failed to load configuration")?;
    let issuer = config
        .pool
        .issuer()
        .context("Pool issuer is not configured")?;

    let keys = Arc::new(KeyCache::for_issuer(&issuer).context("Failed to set up key fetching")?);
    let verifier = TokenVerifier::new(issuer, keys).with_leeway(config.pool.clock_skew());

    match verifier.verify(token_argument(token)).await {
        Ok(claims) => {
            ui::success("Token accepted");
            println!("{}", serde_json::to_string_pretty(&claims)?);
            Ok(())
        }
        Err(VerifyError::Rejected(_)) => {
            ui::error("Not authorized");
            bail!("Token rejected");
        }
        Err(VerifyError::KeyFetch(e)) => {
            Err(anyhow::Error::new(e).context("Could not load signing keys"))
        }
    }
}

/// Accept either a bare token or a pasted `Authorization` header value.
fn token_argument(raw: &str) -> &str {
    let raw = raw.trim();
    TokenVerifier::extract_bearer(raw).unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_argument() {
        assert_eq!(token_argument("abc.def.ghi"), "abc.def.ghi");
        assert_eq!(token_argument("  abc.def.ghi\n"), "abc.def.ghi");
        assert_eq!(token_argument("Bearer abc.def.ghi"), "abc.def.ghi");
        assert_eq!(token_argument("bearer abc.def.ghi "), "abc.def.ghi");
    }
}
