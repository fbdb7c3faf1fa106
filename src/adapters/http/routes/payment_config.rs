use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState, app_error::AppResult,
    use_cases::provider_registry::UpdatePaymentConfigRequest,
};

const DEFAULT_AUDIT_LIMIT: i64 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/tenants/{tenant_id}/payment-config",
            get(get_payment_config).put(update_payment_config),
        )
        .route(
            "/tenants/{tenant_id}/payment-config/audit-log",
            get(list_audit_log),
        )
}

#[derive(Deserialize)]
struct AuditLogParams {
    limit: Option<i64>,
}

async fn get_payment_config(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let status = app_state.registry.get_status(tenant_id).await?;
    Ok(Json(status))
}

async fn update_payment_config(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(payload): Json<UpdatePaymentConfigRequest>,
) -> AppResult<impl IntoResponse> {
    let status = app_state.registry.update_config(tenant_id, payload).await?;
    Ok(Json(status))
}

async fn list_audit_log(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Query(params): Query<AuditLogParams>,
) -> AppResult<impl IntoResponse> {
    let entries = app_state
        .registry
        .recent_audit_entries(tenant_id, params.limit.unwrap_or(DEFAULT_AUDIT_LIMIT))
        .await?;
    Ok(Json(entries))
}
