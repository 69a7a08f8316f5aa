//! Metrics middleware for operations.
//!
//! Wraps each operation in an `operation` tracing span (entity, kind, tenant,
//! duration, outcome) and counts it in `tenantscope_operations_total`.

use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::scope::TenantContextCarrier;
use crate::service::operation::{Operation, OperationError, OperationFuture, OperationResponse};

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments operations with timing and counting.
#[derive(Debug, Clone, Copy)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<Operation> for MetricsService<S>
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
        let entity = op.entity().to_string();
        let kind = op.kind_name();
        let tenant = TenantContextCarrier::current()
            .map_or_else(|| "-".to_string(), |ctx| ctx.tenant_id().to_string());

        let span = info_span!(
            "operation",
            entity = %entity,
            kind = kind,
            tenant = %tenant,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(op);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = start.elapsed().as_millis() as u64;
                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(err) => err.outcome(),
                };

                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);
                metrics::counter!(
                    "tenantscope_operations_total",
                    "entity" => entity,
                    "kind" => kind,
                    "outcome" => outcome
                )
                .increment(1);

                tracing::debug!(duration_ms, outcome, "operation complete");
                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
