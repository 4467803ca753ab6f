//! Gateway server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use poolgate_backend::{IdentityBackend, UserPoolClient};
use poolgate_core::{Config, KeyCache, TokenVerifier};

use crate::GatewayError;
use crate::operations::{AuthOperations, PoolIds};
use crate::routes;

/// Gateway state shared across handlers.
pub struct GatewayState {
    /// Auth operations bound to the backend.
    pub operations: AuthOperations,
    /// Access token verifier.
    pub verifier: Arc<TokenVerifier>,
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("operations", &self.operations)
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

/// Gateway server.
#[derive(Debug)]
pub struct Gateway {
    config: Config,
    state: Arc<GatewayState>,
}

/// Builder for constructing a Gateway with its dependencies.
pub struct GatewayBuilder {
    config: Config,
    backend: Option<Arc<dyn IdentityBackend>>,
    verifier: Option<Arc<TokenVerifier>>,
}

impl GatewayBuilder {
    /// Create a new builder with default config.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            backend: None,
            verifier: None,
        }
    }

    /// Set gateway configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use this identity backend instead of the configured user pool.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn IdentityBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Use this token verifier instead of one built from the issuer.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<TokenVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        self.config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let issuer = self
            .config
            .pool
            .issuer()
            .ok_or_else(|| GatewayError::Config("Pool issuer is not configured".to_string()))?;

        let verifier = match self.verifier {
            Some(verifier) => verifier,
            None => {
                let keys = KeyCache::for_issuer(&issuer)
                    .map_err(|e| GatewayError::Server(e.to_string()))?;
                Arc::new(
                    TokenVerifier::new(issuer, Arc::new(keys))
                        .with_leeway(self.config.pool.clock_skew()),
                )
            }
        };

        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(UserPoolClient::from_config(&self.config)));

        let operations = AuthOperations::new(
            backend,
            PoolIds {
                user_pool_id: self.config.pool.user_pool_id.clone(),
                client_id: self.config.pool.client_id.clone(),
            },
        );

        let state = GatewayState {
            operations,
            verifier,
        };

        Ok(Gateway {
            config: self.config,
            state: Arc::new(state),
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Gateway {
    /// Shared handler state.
    #[must_use]
    pub const fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    /// HTTP router with all routes and layers.
    #[must_use]
    pub fn router(&self) -> Router {
        let router = routes::router(Arc::clone(&self.state))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.config.gateway.body_limit_bytes))
            .layer(TraceLayer::new_for_http());

        if self.config.gateway.cors {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Run the gateway server until it fails or receives Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or the listener fails.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let addr: SocketAddr = format!(
            "{}:{}",
            self.config.gateway.bind_address, self.config.gateway.port
        )
        .parse()
        .map_err(|e| GatewayError::Config(format!("Invalid address: {e}")))?;

        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Gateway listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GatewayError::Server(e.to_string()))?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
