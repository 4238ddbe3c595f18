//! Router assembly and server startup.
//!
//! [`Server`] composes the Axum router and starts the HTTP listener. The
//! CORS layer is attached only to the refresh route — it is the one
//! endpoint browsers and embedded device runtimes call cross-origin; the
//! setup RPC and sign-in bridge are same-origin CLI traffic.

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use crate::api;
use crate::config::ServerConfig;
use crate::state::AppState;

/// The Roost backend server.
pub struct Server {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl Server {
    /// Create a server over assembled application state.
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Build the router with all routes registered.
    ///
    /// Public so end-to-end tests can serve the real router on an
    /// ephemeral port.
    pub fn router(state: Arc<AppState>, cors_origin: Option<&str>) -> Router {
        let cors = match cors_origin {
            Some(origin) => CorsLayer::new()
                .allow_origin(
                    origin
                        .parse::<HeaderValue>()
                        .unwrap_or_else(|_| HeaderValue::from_static("*")),
                )
                .allow_methods([Method::POST])
                .allow_headers(Any),
            None => CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::POST])
                .allow_headers(Any),
        };

        Router::new()
            .route("/v1/status", get(api::status))
            .route("/v1/identity/signin", post(api::signin))
            .route("/v1/devices/setup", post(api::setup_device))
            .route(
                "/v1/devices/token",
                post(api::refresh_device_token).layer(cors),
            )
            .with_state(state)
    }

    /// Start the server and block until it is shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.addr();
        let router = Self::router(self.state, self.config.cors_origin.as_deref());

        tracing::info!(addr = %addr, "starting Roost backend");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
