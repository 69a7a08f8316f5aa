//! Storage traits consumed by the operation pipeline and the audit harness.
//!
//! [`RowStore`] is the relational store the application persists into. It is
//! tenant-agnostic: tenant predicates arrive already injected by the scoping
//! layer. The only tenancy it may know about is its own row-level policy,
//! surfaced through [`RowPolicyEnforcement`].

use async_trait::async_trait;
use tenantscope_core::{Fields, Filter, TenantId};

use super::record::Row;

/// Pluggable persistence backend for tenant-owned entities.
///
/// `session` is the tenant bound to the calling task, passed the way a
/// relational backend would receive `set_config('app.tenant_id', ..)`. Stores
/// without row-level policies ignore it.
///
/// Used as `Arc<dyn RowStore>`.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Insert all rows or none of them.
    async fn insert(
        &self,
        entity: &str,
        rows: Vec<Fields>,
        session: Option<&TenantId>,
    ) -> anyhow::Result<Vec<Row>>;

    /// Rows matching `filter`, at most `limit` of them.
    async fn select(
        &self,
        entity: &str,
        filter: &Filter,
        limit: Option<usize>,
        session: Option<&TenantId>,
    ) -> anyhow::Result<Vec<Row>>;

    /// Number of rows matching `filter`.
    async fn count(
        &self,
        entity: &str,
        filter: &Filter,
        session: Option<&TenantId>,
    ) -> anyhow::Result<u64>;

    /// Apply `changes` to every matching row. Returns the affected count.
    async fn update(
        &self,
        entity: &str,
        filter: &Filter,
        changes: &Fields,
        session: Option<&TenantId>,
    ) -> anyhow::Result<u64>;

    /// Remove every matching row. Returns the affected count.
    async fn delete(
        &self,
        entity: &str,
        filter: &Filter,
        session: Option<&TenantId>,
    ) -> anyhow::Result<u64>;

    /// Update the first matching row with `update`, or insert `create`.
    async fn upsert(
        &self,
        entity: &str,
        filter: &Filter,
        create: Fields,
        update: &Fields,
        session: Option<&TenantId>,
    ) -> anyhow::Result<Row>;
}

/// Storage-engine-level isolation (row-level security), independent of the
/// application-side scoping layer.
#[async_trait]
pub trait RowPolicyEnforcement: Send + Sync {
    /// Whether the engine enforces a tenant policy on `entity`.
    fn is_enforced(&self, entity: &str) -> bool;

    /// Rows of `entity` visible to a raw session bound to `tenant`, with no
    /// application predicate at all.
    async fn session_count(&self, entity: &str, tenant: &TenantId) -> anyhow::Result<u64>;
}
