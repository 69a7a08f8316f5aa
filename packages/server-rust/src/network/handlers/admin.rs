//! Admin endpoints: per-tenant record counts, on-demand audits and the
//! isolation status report.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use tenantscope_core::TenantId;
use tracing::info;

use super::AppState;
use crate::audit::{AuditConfig, AuditReport, IsolationStatus, TenantTestFixture};
use crate::network::error::ApiError;

/// Body of `POST /admin/isolation/audit`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRequest {
    pub fixtures: Vec<TenantTestFixture>,
    #[serde(default)]
    pub config: AuditConfig,
}

/// `GET /admin/tenants/{tenant}/record-counts`
pub async fn record_counts_handler(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> Result<Json<BTreeMap<String, Option<u64>>>, ApiError> {
    let tenant = TenantId::parse(&tenant)
        .ok_or_else(|| ApiError::BadRequest("tenant id must not be empty".to_string()))?;
    Ok(Json(state.scope.admin.get_tenant_record_counts(&tenant).await))
}

/// `POST /admin/isolation/audit`
pub async fn isolation_audit_handler(
    State(state): State<AppState>,
    Json(request): Json<AuditRequest>,
) -> Json<AuditReport> {
    info!(fixtures = request.fixtures.len(), "isolation audit requested");
    Json(
        state
            .scope
            .admin
            .run_isolation_audit(&request.fixtures, &request.config)
            .await,
    )
}

/// `GET /admin/isolation/status`
pub async fn isolation_status_handler(State(state): State<AppState>) -> Json<IsolationStatus> {
    Json(state.scope.admin.get_isolation_status())
}
