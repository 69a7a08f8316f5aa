//! Tenant scoping middleware.
//!
//! Every operation is rewritten against the task's [`TenantContext`] before it
//! reaches storage:
//!
//! | Operation | Rule |
//! |---|---|
//! | create | fill tenant if absent; a different tenant is rejected |
//! | create many | per-item fill; one foreign item rejects the whole batch |
//! | upsert | create branch as create; filter and update as modify |
//! | read | fill tenant filter if absent; an explicit tenant is honoured |
//! | update / delete | fill if absent; a different tenant is rejected |
//!
//! Entities missing from the [`ScopedEntityRegistry`] are refused outright.

use std::sync::Arc;
use std::task::{Context, Poll};

use tenantscope_core::{Filter, Payload, ScopedEntityRegistry, TenantContext, TenantId};
use tower::{Layer, Service};
use tracing::{info, warn};

use crate::scope::{IsolationError, TenantContextCarrier};
use crate::service::operation::{
    ModifyKind, Operation, OperationError, OperationFuture, OperationResponse,
};

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Applies the scoping rules to `op` on behalf of `ctx`.
///
/// On success every payload and filter of the returned operation carries the
/// tenant under the entity's tenant key field.
///
/// # Errors
///
/// Any [`IsolationError`] describing why `op` must not reach storage. Nothing
/// is corrected silently apart from filling an absent tenant.
pub fn scope_operation(
    registry: &ScopedEntityRegistry,
    ctx: Option<&TenantContext>,
    mut op: Operation,
) -> Result<Operation, IsolationError> {
    let ctx = ctx.ok_or(IsolationError::MissingTenantContext)?;
    let entity = op.entity().to_string();
    let key = registry
        .lookup(&entity)
        .ok_or_else(|| IsolationError::UnregisteredEntity {
            entity: entity.clone(),
        })?;
    let rules = Rules {
        entity: &entity,
        key,
        tenant: ctx.tenant_id(),
    };

    match &mut op {
        Operation::Create { payload, .. } => rules.write(payload)?,
        Operation::CreateMany { payloads, .. } => rules.batch(payloads)?,
        Operation::Upsert {
            filter,
            create,
            update,
            ..
        } => {
            rules.write(create)?;
            rules.modify_filter(filter)?;
            rules.modify_changes(update)?;
        }
        Operation::Read { filter, .. } => rules.read(filter)?,
        Operation::Modify { filter, kind, .. } => {
            rules.modify_filter(filter)?;
            if let ModifyKind::Update { changes } = kind {
                rules.modify_changes(changes)?;
            }
        }
    }
    Ok(op)
}

struct Rules<'a> {
    entity: &'a str,
    key: &'a str,
    tenant: &'a TenantId,
}

impl Rules<'_> {
    fn mismatch_on_write(&self) -> IsolationError {
        IsolationError::TenantMismatchOnWrite {
            entity: self.entity.to_string(),
        }
    }

    fn mismatch_on_modify(&self) -> IsolationError {
        IsolationError::TenantMismatchOnModify {
            entity: self.entity.to_string(),
        }
    }

    fn log_foreign(&self, requested: Option<&str>, what: &'static str) {
        warn!(
            entity = self.entity,
            context_tenant = %self.tenant,
            requested_tenant = requested.unwrap_or("<conflicting>"),
            what,
            "cross-tenant access blocked"
        );
    }

    /// Lifts, checks, fills, and seals a payload. Returns the foreign tenant
    /// (or a conflict marker) instead of failing so batches can count.
    fn try_scope_payload(&self, payload: &mut Payload) -> Result<(), Option<String>> {
        if payload.lift_tenant_field(self.key).is_err() {
            return Err(None);
        }
        match payload.tenant() {
            Some(explicit) if explicit != self.tenant.as_str() => Err(Some(explicit.to_string())),
            _ => {
                payload.fill_tenant(self.tenant);
                payload.seal(self.key);
                Ok(())
            }
        }
    }

    fn write(&self, payload: &mut Payload) -> Result<(), IsolationError> {
        self.try_scope_payload(payload).map_err(|requested| {
            self.log_foreign(requested.as_deref(), "create");
            self.mismatch_on_write()
        })
    }

    fn batch(&self, payloads: &mut [Payload]) -> Result<(), IsolationError> {
        let mut offending = 0;
        for payload in payloads.iter_mut() {
            if let Err(requested) = self.try_scope_payload(payload) {
                self.log_foreign(requested.as_deref(), "create_many");
                offending += 1;
            }
        }
        if offending > 0 {
            return Err(IsolationError::CrossTenantBatchWrite {
                entity: self.entity.to_string(),
                offending,
            });
        }
        Ok(())
    }

    fn modify_filter(&self, filter: &mut Filter) -> Result<(), IsolationError> {
        if filter.lift_tenant_field(self.key).is_err() {
            self.log_foreign(None, "modify");
            return Err(self.mismatch_on_modify());
        }
        if let Some(explicit) = filter.tenant() {
            if explicit != self.tenant.as_str() {
                self.log_foreign(Some(explicit), "modify");
                return Err(self.mismatch_on_modify());
            }
        }
        filter.fill_tenant(self.tenant);
        filter.seal(self.key);
        Ok(())
    }

    /// Changes may not move a row to another tenant.
    fn modify_changes(&self, changes: &mut Payload) -> Result<(), IsolationError> {
        self.try_scope_payload(changes).map_err(|requested| {
            self.log_foreign(requested.as_deref(), "modify");
            self.mismatch_on_modify()
        })
    }

    fn read(&self, filter: &mut Filter) -> Result<(), IsolationError> {
        if filter.lift_tenant_field(self.key).is_err() {
            self.log_foreign(None, "read");
            return Err(IsolationError::ConflictingTenantSlot {
                entity: self.entity.to_string(),
            });
        }
        if let Some(explicit) = filter.tenant() {
            if explicit != self.tenant.as_str() {
                info!(
                    entity = self.entity,
                    context_tenant = %self.tenant,
                    requested_tenant = explicit,
                    "explicit cross-tenant read filter honoured"
                );
            }
        }
        filter.fill_tenant(self.tenant);
        filter.seal(self.key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScopingLayer
// ---------------------------------------------------------------------------

/// Tower layer that applies [`scope_operation`] using the carrier's context.
#[derive(Debug, Clone)]
pub struct ScopingLayer {
    registry: Arc<ScopedEntityRegistry>,
}

impl ScopingLayer {
    #[must_use]
    pub fn new(registry: Arc<ScopedEntityRegistry>) -> Self {
        Self { registry }
    }
}

impl<S> Layer<S> for ScopingLayer {
    type Service = ScopingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ScopingService {
            inner,
            registry: Arc::clone(&self.registry),
        }
    }
}

// ---------------------------------------------------------------------------
// ScopingService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ScopingService<S> {
    inner: S,
    registry: Arc<ScopedEntityRegistry>,
}

impl<S> Service<Operation> for ScopingService<S>
where
    S: Service<Operation, Response = OperationResponse, Error = OperationError> + Send,
    S::Future: Send + 'static,
{
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = OperationFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let ctx = TenantContextCarrier::current();
        let entity = op.entity().to_string();
        let kind = op.kind_name();

        match scope_operation(&self.registry, ctx.as_deref(), op) {
            Ok(scoped) => Box::pin(self.inner.call(scoped)),
            Err(err) => {
                if ctx.is_none() || matches!(err, IsolationError::UnregisteredEntity { .. }) {
                    warn!(entity = %entity, kind, reason = err.reason(), "operation refused");
                }
                metrics::counter!("tenantscope_rejections_total", "reason" => err.reason())
                    .increment(1);
                Box::pin(std::future::ready(Err(err.into())))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
