//! Administrative operations consumed by external reporting tools.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tenantscope_core::{Filter, ScopedEntityRegistry, TenantContext, TenantId};
use tracing::warn;

use super::harness::IsolationAuditHarness;
use super::report::AuditReport;
use super::types::{AuditConfig, TenantTestFixture};
use crate::scope::{CarrierSnapshot, TenantContextCarrier};
use crate::service::ScopedClient;
use crate::storage::RowPolicyEnforcement;

/// Isolation posture of the running process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IsolationStatus {
    /// Entity -> whether the storage engine enforces a row policy on it.
    pub secondary_enforcement: BTreeMap<String, bool>,
    pub carrier: CarrierSnapshot,
}

/// Admin surface over the scoped client and the audit harness.
#[derive(Clone)]
pub struct IsolationAdmin {
    client: ScopedClient,
    registry: Arc<ScopedEntityRegistry>,
    carrier: TenantContextCarrier,
    enforcement: Option<Arc<dyn RowPolicyEnforcement>>,
}

impl IsolationAdmin {
    #[must_use]
    pub fn new(
        client: ScopedClient,
        registry: Arc<ScopedEntityRegistry>,
        carrier: TenantContextCarrier,
    ) -> Self {
        Self {
            client,
            registry,
            carrier,
            enforcement: None,
        }
    }

    #[must_use]
    pub fn with_enforcement(mut self, enforcement: Arc<dyn RowPolicyEnforcement>) -> Self {
        self.enforcement = Some(enforcement);
        self
    }

    /// Scoped row count per registered entity for `tenant`.
    ///
    /// An entity whose count fails is reported as `None`.
    pub async fn get_tenant_record_counts(
        &self,
        tenant: &TenantId,
    ) -> BTreeMap<String, Option<u64>> {
        let ctx = TenantContext::new(tenant.clone());
        self.carrier
            .run_scoped(ctx, async {
                let mut counts = BTreeMap::new();
                for entity in self.registry.entity_names() {
                    let count = match self.client.count(entity, Filter::all()).await {
                        Ok(n) => Some(n),
                        Err(err) => {
                            warn!(entity, %err, "could not count records");
                            None
                        }
                    };
                    counts.insert(entity.to_string(), count);
                }
                counts
            })
            .await
    }

    /// Runs an audit and attaches recommendations.
    pub async fn run_isolation_audit(
        &self,
        fixtures: &[TenantTestFixture],
        config: &AuditConfig,
    ) -> AuditReport {
        let mut harness = IsolationAuditHarness::new(
            self.client.clone(),
            Arc::clone(&self.registry),
            self.carrier.clone(),
        );
        if let Some(enforcement) = &self.enforcement {
            harness = harness.with_enforcement(Arc::clone(enforcement));
        }
        let result = harness.run(fixtures, config).await;
        AuditReport::new(result, config)
    }

    #[must_use]
    pub fn get_isolation_status(&self) -> IsolationStatus {
        let secondary_enforcement = self
            .registry
            .entity_names()
            .map(|entity| {
                let enforced = self
                    .enforcement
                    .as_ref()
                    .is_some_and(|e| e.is_enforced(entity));
                (entity.to_string(), enforced)
            })
            .collect();
        IsolationStatus {
            secondary_enforcement,
            carrier: self.carrier.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tenantscope_core::{Fields, Value};

    use super::*;
    use crate::service::ScopeConfig;
    use crate::storage::MemoryRowStore;

    fn admin(store: Arc<MemoryRowStore>, enforced: bool) -> IsolationAdmin {
        let registry = Arc::new(ScopedEntityRegistry::standard());
        let client = ScopedClient::new(store.clone(), Arc::clone(&registry), &ScopeConfig::default());
        let admin = IsolationAdmin::new(client, registry, TenantContextCarrier::new());
        if enforced {
            admin.with_enforcement(store)
        } else {
            admin
        }
    }

    fn seed(store: &MemoryRowStore, entity: &str, tenant: &str) {
        let mut fields = Fields::new();
        fields.insert("tenantId".into(), Value::from(tenant));
        store.insert_raw(entity, fields);
    }

    #[tokio::test]
    async fn record_counts_are_scoped() {
        let store = Arc::new(MemoryRowStore::new());
        seed(&store, "client", "a");
        seed(&store, "client", "a");
        seed(&store, "client", "b");

        let counts = admin(store, false)
            .get_tenant_record_counts(&TenantId::parse("a").unwrap())
            .await;
        assert_eq!(counts["client"], Some(2));
        assert_eq!(counts["payment"], Some(0));
        assert_eq!(counts.len(), ScopedEntityRegistry::standard().len());
    }

    #[tokio::test]
    async fn audit_report_carries_recommendations() {
        let store = Arc::new(MemoryRowStore::new());
        let fixtures = [IsolationAuditHarness::generate_fixture(
            TenantId::parse("a").unwrap(),
            BTreeMap::new(),
        )];
        let report = admin(store, false)
            .run_isolation_audit(&fixtures, &AuditConfig::default())
            .await;
        assert!(report.result.passed);
        assert!(report.recommendations[0].contains("working correctly"));
    }

    #[tokio::test]
    async fn status_reports_enforcement_and_activity() {
        let registry = ScopedEntityRegistry::standard();
        let store = Arc::new(MemoryRowStore::with_row_policies(&registry));
        store.disable_row_policy("event");
        let admin = admin(store, true);

        admin
            .get_tenant_record_counts(&TenantId::parse("a").unwrap())
            .await;
        let status = admin.get_isolation_status();
        assert!(status.secondary_enforcement["appointment"]);
        assert!(!status.secondary_enforcement["event"]);
        assert_eq!(status.carrier.active_scopes, 0);
        assert_eq!(status.carrier.scopes_entered, 1);

        let bare = self::admin(Arc::new(MemoryRowStore::new()), false).get_isolation_status();
        assert!(bare.secondary_enforcement.values().all(|enforced| !enforced));
    }
}
