//! Network module with deferred startup lifecycle.
//!
//! Implements the deferred startup pattern: `new()` creates resources,
//! `start()` binds the TCP listener, and `serve()` starts accepting
//! connections. This separation lets the binary report the bound port (and
//! install exporters) before traffic arrives.

use std::future::Future;
use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use super::config::NetworkConfig;
use super::handlers::{
    context_handler, create_entity_handler, entity_count_handler, health_handler,
    isolation_audit_handler, isolation_status_handler, list_entity_handler, liveness_handler,
    record_counts_handler, AppState,
};
use super::middleware::{build_http_layers, require_admin_token, tenant_boundary};
use crate::runtime::ScopeRuntime;

/// Manages the HTTP server lifecycle.
///
/// 1. `new()` -- builds the shared handler state
/// 2. `start()` -- binds TCP listener to the configured address
/// 3. `serve()` -- begins accepting connections until shutdown is signalled
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    state: AppState,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, scope: Arc<ScopeRuntime>) -> Self {
        let state = AppState::new(scope, Arc::new(config.clone()));
        Self {
            config,
            listener: None,
            state,
        }
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET /health`, `GET /health/live` -- open
    /// - `/api/...` -- behind the tenant boundary
    /// - `/admin/...` -- behind the admin token
    pub fn build_router(&self) -> Router {
        let state = self.state.clone();

        let api = Router::new()
            .route("/api/context", get(context_handler))
            .route(
                "/api/entities/{entity}",
                get(list_entity_handler).post(create_entity_handler),
            )
            .route("/api/entities/{entity}/count", get(entity_count_handler))
            .route_layer(from_fn_with_state(state.clone(), tenant_boundary));

        let admin = Router::new()
            .route(
                "/admin/tenants/{tenant}/record-counts",
                get(record_counts_handler),
            )
            .route("/admin/isolation/audit", post(isolation_audit_handler))
            .route("/admin/isolation/status", get(isolation_status_handler))
            .route_layer(from_fn_with_state(state.clone(), require_admin_token));

        Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .merge(api)
            .merge(admin)
            .layer(build_http_layers(&self.config))
            .with_state(state)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until `shutdown` resolves, then lets in-flight
    /// requests finish.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router();
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;

        info!("Serving HTTP connections");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("HTTP server stopped");
        Ok(())
    }
}
