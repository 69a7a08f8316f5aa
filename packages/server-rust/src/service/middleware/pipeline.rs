//! Pipeline composition: combines all middleware layers into a single service stack.

use std::sync::Arc;
use std::time::Duration;

use tenantscope_core::ScopedEntityRegistry;
use tower::ServiceBuilder;

use super::metrics::MetricsLayer;
use super::scoping::ScopingLayer;
use super::timeout::TimeoutLayer;
use crate::service::config::ScopeConfig;
use crate::service::executor::StoreExecutor;
use crate::service::operation::{Operation, OperationError, OperationFuture, OperationResponse};
use crate::storage::RowStore;

/// Build the scoped operation pipeline in front of `store`.
///
/// Layer order (outermost to innermost):
/// 1. `TimeoutLayer` -- bound the whole operation
/// 2. `MetricsLayer` -- record timing and outcome, rejections included
/// 3. `ScopingLayer` -- apply the tenant rules or refuse the operation
/// 4. `StoreExecutor` -- run the scoped operation with the session tenant
#[must_use]
pub fn build_scoped_pipeline(
    store: Arc<dyn RowStore>,
    registry: Arc<ScopedEntityRegistry>,
    config: &ScopeConfig,
) -> impl tower::Service<
    Operation,
    Response = OperationResponse,
    Error = OperationError,
    Future = OperationFuture,
> + Clone
       + Send
       + Sync
       + 'static {
    ServiceBuilder::new()
        .layer(TimeoutLayer::new(Duration::from_millis(
            config.operation_timeout_ms,
        )))
        .layer(MetricsLayer)
        .layer(ScopingLayer::new(registry))
        .service(StoreExecutor::new(store))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tenantscope_core::{Filter, Payload, TenantContext, TenantId, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::scope::{IsolationError, TenantContextCarrier};
    use crate::service::operation::ReadKind;
    use crate::storage::MemoryRowStore;

    fn ctx(tenant: &str) -> TenantContext {
        TenantContext::new(TenantId::parse(tenant).unwrap())
    }

    #[tokio::test]
    async fn pipeline_routes_through_all_layers() {
        let store = Arc::new(MemoryRowStore::new());
        let svc = build_scoped_pipeline(
            store.clone(),
            Arc::new(ScopedEntityRegistry::standard()),
            &ScopeConfig::default(),
        );
        let carrier = TenantContextCarrier::new();

        let create = Operation::Create {
            entity: "appointment".into(),
            payload: Payload::new().field("status", "BOOKED"),
        };
        let resp = carrier
            .run_scoped(ctx("t-1"), svc.clone().oneshot(create))
            .await
            .unwrap();
        let OperationResponse::Created(rows) = resp else {
            panic!("unexpected response");
        };
        assert_eq!(rows[0].get("tenantId"), Some(&Value::from("t-1")));

        let count = Operation::Read {
            entity: "appointment".into(),
            filter: Filter::all(),
            kind: ReadKind::Count,
        };
        let other = carrier
            .run_scoped(ctx("t-2"), svc.clone().oneshot(count.clone()))
            .await
            .unwrap();
        assert_eq!(other, OperationResponse::Count(0));

        let err = svc.oneshot(count).await.unwrap_err();
        assert!(matches!(
            err,
            OperationError::Isolation(IsolationError::MissingTenantContext)
        ));
        assert_eq!(store.table_len("appointment"), 1);
    }
}
