//! In-memory [`RowStore`] backed by [`DashMap`], with optional row policies.
//!
//! One `DashMap` shard entry per entity table; every mutating call holds that
//! entry for its whole duration, so batch inserts and upserts are atomic per
//! table. Row policies mimic relational row-level security: a policy on an
//! entity hides every row whose tenant column differs from the session
//! tenant, and refuses inserts and updates that would violate it.

use async_trait::async_trait;
use dashmap::DashMap;
use tenantscope_core::{Fields, Filter, ScopedEntityRegistry, TenantId};

use crate::storage::engine::{RowPolicyEnforcement, RowStore};
use crate::storage::record::Row;

/// In-memory relational store for development, tests, and audit fixtures.
#[derive(Default)]
pub struct MemoryRowStore {
    tables: DashMap<String, Vec<Row>>,
    /// entity -> tenant column guarded by a row policy.
    policies: DashMap<String, String>,
}

impl MemoryRowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with a row policy on every registered entity.
    #[must_use]
    pub fn with_row_policies(registry: &ScopedEntityRegistry) -> Self {
        let store = Self::new();
        for descriptor in registry.descriptors() {
            store.enable_row_policy(&descriptor.entity_name, &descriptor.tenant_key_field);
        }
        store
    }

    /// Enforces `row.column == session tenant` on `entity`.
    pub fn enable_row_policy(&self, entity: &str, column: &str) {
        self.policies.insert(entity.to_string(), column.to_string());
    }

    pub fn disable_row_policy(&self, entity: &str) {
        self.policies.remove(entity);
    }

    /// Inserts a row directly, bypassing policies. Fixture seeding only.
    pub fn insert_raw(&self, entity: &str, fields: Fields) -> Row {
        let row = Row::new(fields);
        self.tables
            .entry(entity.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    /// Total rows in `entity`, ignoring policies.
    #[must_use]
    pub fn table_len(&self, entity: &str) -> usize {
        self.tables.get(entity).map_or(0, |t| t.len())
    }

    fn policy_column(&self, entity: &str) -> Option<String> {
        self.policies.get(entity).map(|c| c.value().clone())
    }
}

/// Whether the policy (if any) lets `session` see `fields`.
fn visible(policy: Option<&str>, session: Option<&TenantId>, fields: &Fields) -> bool {
    match (policy, session) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(column), Some(tenant)) => {
            fields.get(column).and_then(|v| v.as_str()) == Some(tenant.as_str())
        }
    }
}

/// `fields` as they would read after `changes`.
fn merged(fields: &Fields, changes: &Fields) -> Fields {
    let mut out = fields.clone();
    out.extend(changes.iter().map(|(k, v)| (k.clone(), v.clone())));
    out
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn insert(
        &self,
        entity: &str,
        rows: Vec<Fields>,
        session: Option<&TenantId>,
    ) -> anyhow::Result<Vec<Row>> {
        let policy = self.policy_column(entity);
        if let Some(offending) = rows
            .iter()
            .position(|fields| !visible(policy.as_deref(), session, fields))
        {
            anyhow::bail!("row policy on {entity} rejected insert of item {offending}");
        }

        let rows: Vec<Row> = rows.into_iter().map(Row::new).collect();
        self.tables
            .entry(entity.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn select(
        &self,
        entity: &str,
        filter: &Filter,
        limit: Option<usize>,
        session: Option<&TenantId>,
    ) -> anyhow::Result<Vec<Row>> {
        let policy = self.policy_column(entity);
        let Some(table) = self.tables.get(entity) else {
            return Ok(Vec::new());
        };
        Ok(table
            .iter()
            .filter(|row| visible(policy.as_deref(), session, &row.fields))
            .filter(|row| filter.matches(&row.fields))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn count(
        &self,
        entity: &str,
        filter: &Filter,
        session: Option<&TenantId>,
    ) -> anyhow::Result<u64> {
        let policy = self.policy_column(entity);
        let Some(table) = self.tables.get(entity) else {
            return Ok(0);
        };
        let n = table
            .iter()
            .filter(|row| visible(policy.as_deref(), session, &row.fields))
            .filter(|row| filter.matches(&row.fields))
            .count();
        Ok(n as u64)
    }

    async fn update(
        &self,
        entity: &str,
        filter: &Filter,
        changes: &Fields,
        session: Option<&TenantId>,
    ) -> anyhow::Result<u64> {
        let policy = self.policy_column(entity);
        let Some(mut table) = self.tables.get_mut(entity) else {
            return Ok(0);
        };
        let targets: Vec<usize> = table
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                visible(policy.as_deref(), session, &row.fields) && filter.matches(&row.fields)
            })
            .map(|(i, _)| i)
            .collect();
        if let Some(&offending) = targets
            .iter()
            .find(|&&i| !visible(policy.as_deref(), session, &merged(&table[i].fields, changes)))
        {
            anyhow::bail!("row policy on {entity} rejected update of row {}", table[offending].id);
        }
        for &i in &targets {
            table[i].apply(changes);
        }
        Ok(targets.len() as u64)
    }

    async fn delete(
        &self,
        entity: &str,
        filter: &Filter,
        session: Option<&TenantId>,
    ) -> anyhow::Result<u64> {
        let policy = self.policy_column(entity);
        let Some(mut table) = self.tables.get_mut(entity) else {
            return Ok(0);
        };
        let before = table.len();
        table.retain(|row| {
            !(visible(policy.as_deref(), session, &row.fields) && filter.matches(&row.fields))
        });
        Ok((before - table.len()) as u64)
    }

    async fn upsert(
        &self,
        entity: &str,
        filter: &Filter,
        create: Fields,
        update: &Fields,
        session: Option<&TenantId>,
    ) -> anyhow::Result<Row> {
        let policy = self.policy_column(entity);
        let mut table = self.tables.entry(entity.to_string()).or_default();

        if let Some(row) = table.iter_mut().find(|row| {
            visible(policy.as_deref(), session, &row.fields) && filter.matches(&row.fields)
        }) {
            if !visible(policy.as_deref(), session, &merged(&row.fields, update)) {
                anyhow::bail!("row policy on {entity} rejected upsert update");
            }
            row.apply(update);
            return Ok(row.clone());
        }

        if !visible(policy.as_deref(), session, &create) {
            anyhow::bail!("row policy on {entity} rejected upsert insert");
        }
        let row = Row::new(create);
        table.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl RowPolicyEnforcement for MemoryRowStore {
    fn is_enforced(&self, entity: &str) -> bool {
        self.policies.contains_key(entity)
    }

    async fn session_count(&self, entity: &str, tenant: &TenantId) -> anyhow::Result<u64> {
        self.count(entity, &Filter::all(), Some(tenant)).await
    }
}

#[cfg(test)]
mod tests {
    use tenantscope_core::Value;

    use super::*;

    fn row(tenant: &str, status: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("tenantId".into(), Value::from(tenant));
        fields.insert("status".into(), Value::from(status));
        fields
    }

    fn tenant(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    fn sealed(tenant: &str) -> Filter {
        let mut filter = Filter::all().for_tenant(tenant);
        filter.seal("tenantId");
        filter
    }

    #[tokio::test]
    async fn insert_then_select_round_trip() {
        let store = MemoryRowStore::new();
        let inserted = store
            .insert("appointment", vec![row("a", "BOOKED"), row("b", "BOOKED")], None)
            .await
            .unwrap();
        assert_eq!(inserted.len(), 2);

        let rows = store
            .select("appointment", &sealed("a"), None, None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("tenantId"), Some(&Value::from("a")));
    }

    #[tokio::test]
    async fn select_respects_limit_and_missing_tables() {
        let store = MemoryRowStore::new();
        for _ in 0..5 {
            store.insert_raw("client", row("a", "ACTIVE"));
        }
        let rows = store
            .select("client", &Filter::all(), Some(3), None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(store
            .select("nothing", &Filter::all(), None, None)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.count("nothing", &Filter::all(), None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_and_delete_touch_only_matching_rows() {
        let store = MemoryRowStore::new();
        store.insert_raw("appointment", row("a", "BOOKED"));
        store.insert_raw("appointment", row("b", "BOOKED"));

        let mut changes = Fields::new();
        changes.insert("status".into(), Value::from("CANCELLED"));
        let updated = store
            .update("appointment", &sealed("a"), &changes, None)
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let deleted = store
            .delete("appointment", &sealed("b"), None)
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.table_len("appointment"), 1);
    }

    #[tokio::test]
    async fn row_policy_hides_foreign_rows_and_blocks_foreign_inserts() {
        let store = MemoryRowStore::new();
        store.enable_row_policy("appointment", "tenantId");
        store.insert_raw("appointment", row("a", "BOOKED"));
        store.insert_raw("appointment", row("b", "BOOKED"));

        // Explicit filter for tenant a, session bound to b: the policy wins.
        let visible_to_b = store
            .count("appointment", &sealed("a"), Some(&tenant("b")))
            .await
            .unwrap();
        assert_eq!(visible_to_b, 0);

        // No session at all sees nothing on a policed table.
        assert_eq!(
            store.count("appointment", &Filter::all(), None).await.unwrap(),
            0
        );

        let err = store
            .insert("appointment", vec![row("a", "NEW")], Some(&tenant("b")))
            .await;
        assert!(err.is_err());
        assert_eq!(store.table_len("appointment"), 2);
    }

    #[tokio::test]
    async fn row_policy_blocks_updates_that_rehome_rows() {
        let store = MemoryRowStore::new();
        store.enable_row_policy("client", "tenantId");
        store.insert_raw("client", row("a", "ACTIVE"));
        store.insert_raw("client", row("a", "ACTIVE"));

        let mut changes = Fields::new();
        changes.insert("tenantId".into(), Value::from("b"));
        let err = store
            .update("client", &Filter::all(), &changes, Some(&tenant("a")))
            .await;
        assert!(err.is_err());
        assert_eq!(store.session_count("client", &tenant("a")).await.unwrap(), 2);
        assert_eq!(store.session_count("client", &tenant("b")).await.unwrap(), 0);

        let err = store
            .upsert(
                "client",
                &Filter::all(),
                row("a", "NEW"),
                &changes,
                Some(&tenant("a")),
            )
            .await;
        assert!(err.is_err());
        assert_eq!(store.session_count("client", &tenant("b")).await.unwrap(), 0);

        // Changes that keep the owner still go through.
        let mut status = Fields::new();
        status.insert("status".into(), Value::from("ARCHIVED"));
        let affected = store
            .update("client", &Filter::all(), &status, Some(&tenant("a")))
            .await
            .unwrap();
        assert_eq!(affected, 2);
    }

    #[tokio::test]
    async fn session_count_reflects_policy_state() {
        let store = MemoryRowStore::new();
        store.insert_raw("payment", row("a", "PAID"));
        store.insert_raw("payment", row("b", "PAID"));

        assert!(!store.is_enforced("payment"));
        assert_eq!(store.session_count("payment", &tenant("a")).await.unwrap(), 2);

        store.enable_row_policy("payment", "tenantId");
        assert!(store.is_enforced("payment"));
        assert_eq!(store.session_count("payment", &tenant("a")).await.unwrap(), 1);

        store.disable_row_policy("payment");
        assert!(!store.is_enforced("payment"));
    }

    #[tokio::test]
    async fn upsert_updates_existing_or_inserts() {
        let store = MemoryRowStore::new();
        let filter = sealed("a").eq("status", "BOOKED");
        let mut update = Fields::new();
        update.insert("status".into(), Value::from("DONE"));

        let created = store
            .upsert("appointment", &filter, row("a", "BOOKED"), &update, None)
            .await
            .unwrap();
        assert_eq!(created.version, 1);

        let updated = store
            .upsert("appointment", &filter, row("a", "BOOKED"), &update, None)
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.get("status"), Some(&Value::from("DONE")));
        assert_eq!(store.table_len("appointment"), 1);
    }

    #[test]
    fn with_row_policies_covers_registry() {
        let store = MemoryRowStore::with_row_policies(&ScopedEntityRegistry::standard());
        assert!(store.is_enforced("appointment"));
        assert!(store.is_enforced("subscription"));
        assert!(!store.is_enforced("audit_log"));
    }
}
