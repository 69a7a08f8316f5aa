//! Innermost service of the pipeline: hands scoped operations to the store.

use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;

use crate::scope::TenantContextCarrier;
use crate::service::operation::{
    ModifyKind, Operation, OperationError, OperationFuture, OperationResponse, ReadKind,
};
use crate::storage::RowStore;

/// Executes operations against a [`RowStore`].
///
/// The tenant bound to the calling task is forwarded as the store's session
/// tenant so that engine-level row policies see it.
#[derive(Clone)]
pub struct StoreExecutor {
    store: Arc<dyn RowStore>,
}

impl StoreExecutor {
    #[must_use]
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }
}

impl Service<Operation> for StoreExecutor {
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = OperationFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let store = Arc::clone(&self.store);
        let session = TenantContextCarrier::current().map(|ctx| ctx.tenant_id().clone());

        Box::pin(async move {
            let session = session.as_ref();
            let response = match op {
                Operation::Create { entity, payload } => OperationResponse::Created(
                    store
                        .insert(&entity, vec![payload.into_fields()], session)
                        .await?,
                ),
                Operation::CreateMany { entity, payloads } => {
                    let rows = payloads.into_iter().map(|p| p.into_fields()).collect();
                    OperationResponse::Created(store.insert(&entity, rows, session).await?)
                }
                Operation::Upsert {
                    entity,
                    filter,
                    create,
                    update,
                } => {
                    let update = update.into_fields();
                    let row = store
                        .upsert(&entity, &filter, create.into_fields(), &update, session)
                        .await?;
                    OperationResponse::Row(Some(row))
                }
                Operation::Read {
                    entity,
                    filter,
                    kind,
                } => match kind {
                    ReadKind::First => {
                        let rows = store.select(&entity, &filter, Some(1), session).await?;
                        OperationResponse::Row(rows.into_iter().next())
                    }
                    ReadKind::Many { limit } => {
                        OperationResponse::Rows(store.select(&entity, &filter, limit, session).await?)
                    }
                    ReadKind::Count => {
                        OperationResponse::Count(store.count(&entity, &filter, session).await?)
                    }
                },
                Operation::Modify {
                    entity,
                    filter,
                    kind,
                } => match kind {
                    ModifyKind::Update { changes } => OperationResponse::Affected(
                        store
                            .update(&entity, &filter, &changes.into_fields(), session)
                            .await?,
                    ),
                    ModifyKind::Delete => {
                        OperationResponse::Affected(store.delete(&entity, &filter, session).await?)
                    }
                },
            };
            Ok(response)
        })
    }
}
