//! Wiring of the isolation components into one shareable bundle.

use std::sync::Arc;

use tenantscope_core::ScopedEntityRegistry;

use crate::audit::IsolationAdmin;
use crate::scope::{AccessBoundaryGuard, GuardConfig, TenantContextCarrier};
use crate::service::{ScopeConfig, ScopedClient};
use crate::storage::{RowPolicyEnforcement, RowStore};

/// Everything a request boundary and the admin surface need.
#[derive(Clone)]
pub struct ScopeRuntime {
    pub registry: Arc<ScopedEntityRegistry>,
    pub carrier: TenantContextCarrier,
    pub guard: AccessBoundaryGuard,
    pub client: ScopedClient,
    pub admin: IsolationAdmin,
}

impl ScopeRuntime {
    /// # Errors
    ///
    /// Returns an error if the guard's tenant id pattern does not compile.
    pub fn new(
        store: Arc<dyn RowStore>,
        registry: ScopedEntityRegistry,
        scope_config: &ScopeConfig,
        guard_config: &GuardConfig,
    ) -> Result<Self, regex::Error> {
        let registry = Arc::new(registry);
        let carrier = TenantContextCarrier::new();
        let client = ScopedClient::new(store, Arc::clone(&registry), scope_config);
        let admin = IsolationAdmin::new(client.clone(), Arc::clone(&registry), carrier.clone());
        Ok(Self {
            guard: AccessBoundaryGuard::new(guard_config)?,
            registry,
            carrier,
            client,
            admin,
        })
    }

    /// Exposes the store's row policies to the audit and status operations.
    #[must_use]
    pub fn with_enforcement(mut self, enforcement: Arc<dyn RowPolicyEnforcement>) -> Self {
        self.admin = self.admin.with_enforcement(enforcement);
        self
    }
}
