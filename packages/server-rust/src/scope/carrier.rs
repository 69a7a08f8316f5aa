//! Ambient tenant context, bound to the task rather than the process.
//!
//! The active [`TenantContext`] lives in a tokio task-local. It travels with
//! the future that entered the scope across every suspension point, and two
//! tasks interleaved on the same worker thread each see only their own value.
//! Nothing here is process-wide mutable state apart from activity counters.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tenantscope_core::TenantContext;
use tokio::task::JoinHandle;
use tracing::{info_span, warn, Instrument};

use super::error::IsolationError;

tokio::task_local! {
    static ACTIVE_CONTEXT: Arc<TenantContext>;
}

#[derive(Debug, Default)]
struct CarrierStats {
    active: AtomicU64,
    entered: AtomicU64,
    spawned: AtomicU64,
}

/// Point-in-time view of carrier activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierSnapshot {
    /// Scopes currently executing.
    pub active_scopes: u64,
    /// Scopes entered since the carrier was created.
    pub scopes_entered: u64,
    /// Tasks spawned through [`TenantContextCarrier::spawn_scoped`].
    pub spawned_tasks: u64,
}

/// Decrements the active-scope gauge on drop, including on cancellation.
struct ActiveScope {
    stats: Arc<CarrierStats>,
}

impl ActiveScope {
    fn enter(stats: &Arc<CarrierStats>) -> Self {
        stats.active.fetch_add(1, Ordering::Relaxed);
        stats.entered.fetch_add(1, Ordering::Relaxed);
        Self {
            stats: Arc::clone(stats),
        }
    }
}

impl Drop for ActiveScope {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Establishes and reads the per-task tenant context.
///
/// Cloning is cheap; clones share activity counters.
#[derive(Debug, Clone, Default)]
pub struct TenantContextCarrier {
    stats: Arc<CarrierStats>,
}

impl TenantContextCarrier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The context of the calling task, or `None` outside any scope.
    #[must_use]
    pub fn current() -> Option<Arc<TenantContext>> {
        ACTIVE_CONTEXT.try_with(Arc::clone).ok()
    }

    /// Checks that an already-loaded resource owned by `resource_tenant`
    /// belongs to the calling task's tenant.
    ///
    /// # Errors
    ///
    /// [`IsolationError::MissingTenantContext`] outside any scope,
    /// [`IsolationError::ForeignResource`] when the owners differ.
    pub fn ensure_owned(resource_tenant: &str, operation: &str) -> Result<(), IsolationError> {
        let ctx = Self::current().ok_or(IsolationError::MissingTenantContext)?;
        if ctx.tenant_id().as_str() == resource_tenant.trim() {
            return Ok(());
        }
        warn!(
            context_tenant = %ctx.tenant_id(),
            resource_tenant,
            operation,
            "access to foreign resource refused"
        );
        Err(IsolationError::ForeignResource {
            operation: operation.to_string(),
        })
    }

    /// Runs `fut` with `ctx` active for its whole lifetime.
    ///
    /// Scopes nest: the inner context shadows the outer one until `fut`
    /// finishes, fails, or is dropped, after which the caller's context (or
    /// its absence) is visible again. This is also how a request "sets" its
    /// context: the boundary guard wraps the rest of the request in a scope.
    pub async fn run_scoped<F>(&self, ctx: TenantContext, fut: F) -> F::Output
    where
        F: Future,
    {
        self.enter(Arc::new(ctx), fut).await
    }

    /// Synchronous counterpart of [`run_scoped`](Self::run_scoped).
    pub fn run_scoped_sync<R>(&self, ctx: TenantContext, f: impl FnOnce() -> R) -> R {
        let _active = ActiveScope::enter(&self.stats);
        ACTIVE_CONTEXT.sync_scope(Arc::new(ctx), f)
    }

    /// Spawns `fut` on the runtime with a copy of the caller's context.
    ///
    /// A caller without context spawns a task without context.
    pub fn spawn_scoped<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.stats.spawned.fetch_add(1, Ordering::Relaxed);
        match Self::current() {
            Some(ctx) => {
                let carrier = self.clone();
                tokio::spawn(async move { carrier.enter(ctx, fut).await })
            }
            None => tokio::spawn(fut),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> CarrierSnapshot {
        CarrierSnapshot {
            active_scopes: self.stats.active.load(Ordering::Relaxed),
            scopes_entered: self.stats.entered.load(Ordering::Relaxed),
            spawned_tasks: self.stats.spawned.load(Ordering::Relaxed),
        }
    }

    async fn enter<F>(&self, ctx: Arc<TenantContext>, fut: F) -> F::Output
    where
        F: Future,
    {
        let _active = ActiveScope::enter(&self.stats);
        let span = info_span!("tenant_scope", tenant = %ctx.tenant_id());
        ACTIVE_CONTEXT.scope(ctx, fut.instrument(span)).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tenantscope_core::TenantId;

    use super::*;

    fn ctx(tenant: &str) -> TenantContext {
        TenantContext::new(TenantId::parse(tenant).unwrap())
    }

    fn current_tenant() -> Option<String> {
        TenantContextCarrier::current().map(|c| c.tenant_id().to_string())
    }

    #[tokio::test]
    async fn no_context_outside_scope() {
        assert!(TenantContextCarrier::current().is_none());
    }

    #[tokio::test]
    async fn ensure_owned_checks_the_resource_owner() {
        assert_eq!(
            TenantContextCarrier::ensure_owned("t-1", "read"),
            Err(IsolationError::MissingTenantContext)
        );

        let carrier = TenantContextCarrier::new();
        carrier
            .run_scoped(ctx("t-1"), async {
                assert_eq!(TenantContextCarrier::ensure_owned("t-1", "read"), Ok(()));
                let err = TenantContextCarrier::ensure_owned("t-2", "delete").unwrap_err();
                assert_eq!(
                    err,
                    IsolationError::ForeignResource {
                        operation: "delete".to_string()
                    }
                );
                assert_eq!(err.public_message(), "access denied");
                assert!(!err.to_string().contains("t-2"));
            })
            .await;
    }

    #[tokio::test]
    async fn context_survives_suspension_points() {
        let carrier = TenantContextCarrier::new();
        let seen = carrier
            .run_scoped(ctx("t-1"), async {
                tokio::task::yield_now().await;
                tokio::time::sleep(Duration::from_millis(1)).await;
                current_tenant()
            })
            .await;
        assert_eq!(seen.as_deref(), Some("t-1"));
        assert!(current_tenant().is_none());
    }

    #[tokio::test]
    async fn nested_scopes_are_stack_disciplined() {
        let carrier = TenantContextCarrier::new();
        let inner_carrier = carrier.clone();
        let trace = carrier
            .run_scoped(ctx("outer"), async move {
                let mut trace = vec![current_tenant()];
                let inner = inner_carrier
                    .run_scoped(ctx("inner"), async { current_tenant() })
                    .await;
                trace.push(inner);
                trace.push(current_tenant());
                trace
            })
            .await;
        assert_eq!(
            trace,
            vec![
                Some("outer".to_string()),
                Some("inner".to_string()),
                Some("outer".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn failing_scope_reverts_context() {
        let carrier = TenantContextCarrier::new();
        let result: Result<(), &str> = carrier
            .run_scoped(ctx("t-1"), async { Err("boom") })
            .await;
        assert!(result.is_err());
        assert!(current_tenant().is_none());
        assert_eq!(carrier.snapshot().active_scopes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_scope_releases_activity() {
        let carrier = TenantContextCarrier::new();
        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            carrier.run_scoped(ctx("t-1"), tokio::time::sleep(Duration::from_secs(60))),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(carrier.snapshot().active_scopes, 0);
        assert_eq!(carrier.snapshot().scopes_entered, 1);
        assert!(current_tenant().is_none());
    }

    #[tokio::test]
    async fn interleaved_scopes_never_observe_each_other() {
        let carrier = TenantContextCarrier::new();
        let probe = |tenant: &'static str| {
            let carrier = carrier.clone();
            async move {
                carrier
                    .run_scoped(ctx(tenant), async move {
                        for _ in 0..200 {
                            tokio::task::yield_now().await;
                            assert_eq!(current_tenant().as_deref(), Some(tenant));
                        }
                    })
                    .await;
            }
        };
        // Same task, same thread: join! polls both futures alternately.
        tokio::join!(probe("t-1"), probe("t-2"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_tasks_on_shared_workers_stay_isolated() {
        let carrier = TenantContextCarrier::new();
        let mut handles = Vec::new();
        for i in 0..64 {
            let carrier = carrier.clone();
            let tenant = format!("tenant-{i}");
            handles.push(tokio::spawn(async move {
                carrier
                    .run_scoped(ctx(&tenant), async {
                        for _ in 0..50 {
                            tokio::task::yield_now().await;
                            if current_tenant().as_deref() != Some(tenant.as_str()) {
                                return false;
                            }
                        }
                        true
                    })
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(carrier.snapshot().active_scopes, 0);
        assert_eq!(carrier.snapshot().scopes_entered, 64);
    }

    #[tokio::test]
    async fn spawned_subtasks_inherit_a_copy() {
        let carrier = TenantContextCarrier::new();
        let spawner = carrier.clone();
        let (inherited, plain) = carrier
            .run_scoped(ctx("t-1"), async move {
                let inherited = spawner.spawn_scoped(async { current_tenant() });
                let plain = tokio::spawn(async { current_tenant() });
                (inherited.await.unwrap(), plain.await.unwrap())
            })
            .await;
        assert_eq!(inherited.as_deref(), Some("t-1"));
        // A raw tokio::spawn does not carry the context along.
        assert!(plain.is_none());
        assert_eq!(carrier.snapshot().spawned_tasks, 1);
    }

    #[tokio::test]
    async fn spawn_without_context_stays_unscoped() {
        let carrier = TenantContextCarrier::new();
        let seen = carrier.spawn_scoped(async { current_tenant() }).await.unwrap();
        assert!(seen.is_none());
    }

    #[test]
    fn sync_scope_sets_and_reverts() {
        let carrier = TenantContextCarrier::new();
        let seen = carrier.run_scoped_sync(ctx("t-1"), current_tenant);
        assert_eq!(seen.as_deref(), Some("t-1"));
        assert!(current_tenant().is_none());
    }
}
