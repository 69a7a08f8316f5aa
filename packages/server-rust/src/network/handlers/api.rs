//! Tenant-facing endpoints. Every route here runs behind the tenant
//! boundary, so the scoped client always sees an active context.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tenantscope_core::{Fields, Filter, Payload};

use super::AppState;
use crate::network::error::ApiError;
use crate::scope::{IsolationError, TenantContextCarrier};
use crate::storage::Row;

const DEFAULT_LIST_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    limit: Option<usize>,
}

/// `GET /api/context` -- echoes the resolved context.
pub async fn context_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ctx = TenantContextCarrier::current().ok_or(IsolationError::MissingTenantContext)?;
    Ok(Json(json!({
        "context": &*ctx,
        "scopedEntities": state.scope.registry.len(),
    })))
}

/// `GET /api/entities/{entity}/count`
pub async fn entity_count_handler(
    State(state): State<AppState>,
    Path(entity): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let count = state.scope.client.count(&entity, Filter::all()).await?;
    Ok(Json(json!({ "entity": entity, "count": count })))
}

/// `GET /api/entities/{entity}?limit=N`
pub async fn list_entity_handler(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Row>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let rows = state
        .scope
        .client
        .find_many(&entity, Filter::all(), Some(limit))
        .await?;
    Ok(Json(rows))
}

/// `POST /api/entities/{entity}` -- the tenant column is filled from the
/// context; a body naming another tenant is refused.
pub async fn create_entity_handler(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Json(fields): Json<Fields>,
) -> Result<(StatusCode, Json<Row>), ApiError> {
    let row = state
        .scope
        .client
        .create(&entity, Payload::from_fields(fields))
        .await?;
    Ok((StatusCode::CREATED, Json(row)))
}
