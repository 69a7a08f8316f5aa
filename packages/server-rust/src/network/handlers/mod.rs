//! HTTP handler definitions for the tenantscope server.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports all handler functions for convenient access
//! when building the router.

pub mod admin;
pub mod api;
pub mod health;

pub use admin::{isolation_audit_handler, isolation_status_handler, record_counts_handler};
pub use api::{
    context_handler, create_entity_handler, entity_count_handler, list_entity_handler,
};
pub use health::{health_handler, liveness_handler};

use std::sync::Arc;
use std::time::Instant;

use jsonwebtoken::DecodingKey;

use super::NetworkConfig;
use crate::runtime::ScopeRuntime;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Guard, carrier, scoped client and admin surface.
    pub scope: Arc<ScopeRuntime>,
    /// Network configuration (bind address, admin token, bearer secret).
    pub config: Arc<NetworkConfig>,
    /// Bearer token key, present when a secret is configured.
    pub jwt_key: Option<Arc<DecodingKey>>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(scope: Arc<ScopeRuntime>, config: Arc<NetworkConfig>) -> Self {
        let jwt_key = config
            .jwt_secret
            .as_deref()
            .map(|secret| Arc::new(DecodingKey::from_secret(secret.as_bytes())));
        Self {
            scope,
            config,
            jwt_key,
            start_time: Instant::now(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use tenantscope_core::ScopedEntityRegistry;

    use super::AppState;
    use crate::network::NetworkConfig;
    use crate::runtime::ScopeRuntime;
    use crate::scope::GuardConfig;
    use crate::service::ScopeConfig;
    use crate::storage::MemoryRowStore;

    pub(crate) fn state_with(store: Arc<MemoryRowStore>, config: NetworkConfig) -> AppState {
        let runtime = ScopeRuntime::new(
            store,
            ScopedEntityRegistry::standard(),
            &ScopeConfig::default(),
            &GuardConfig::default(),
        )
        .unwrap();
        AppState::new(Arc::new(runtime), Arc::new(config))
    }

    pub(crate) fn test_state() -> AppState {
        state_with(Arc::new(MemoryRowStore::new()), NetworkConfig::default())
    }
}
