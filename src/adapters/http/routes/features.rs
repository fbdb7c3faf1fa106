use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState, app_error::AppResult,
    domain::entities::trial_status::TrialEndReason,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tenants/{tenant_id}/features", get(list_features))
        .route("/tenants/{tenant_id}/features/{feature_key}", get(get_feature_access))
        .route(
            "/tenants/{tenant_id}/features/{feature_key}/trial",
            post(start_trial),
        )
        .route("/trials/{trial_id}/end", post(end_trial))
        .route(
            "/tenants/{tenant_id}/features/{feature_key}/addon",
            post(purchase_addon),
        )
        .route("/addons/{addon_id}/cancel", post(cancel_addon))
}

#[derive(Deserialize, Default)]
struct StartTrialPayload {
    /// Set when an operator grants a trial outside the one-per-feature rule.
    operator_id: Option<Uuid>,
}

#[derive(Deserialize)]
struct EndTrialPayload {
    reason: TrialEndReason,
}

async fn list_features(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(app_state.entitlements.list_all_features(tenant_id).await?))
}

async fn get_feature_access(
    State(app_state): State<AppState>,
    Path((tenant_id, feature_key)): Path<(Uuid, String)>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(
        app_state
            .entitlements
            .has_access(tenant_id, &feature_key)
            .await?,
    ))
}

async fn start_trial(
    State(app_state): State<AppState>,
    Path((tenant_id, feature_key)): Path<(Uuid, String)>,
    payload: Option<Json<StartTrialPayload>>,
) -> AppResult<impl IntoResponse> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let trial = app_state
        .entitlements
        .start_trial(tenant_id, &feature_key, payload.operator_id)
        .await?;
    Ok((StatusCode::CREATED, Json(trial)))
}

async fn end_trial(
    State(app_state): State<AppState>,
    Path(trial_id): Path<Uuid>,
    Json(payload): Json<EndTrialPayload>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(
        app_state
            .entitlements
            .end_trial(trial_id, payload.reason)
            .await?,
    ))
}

async fn purchase_addon(
    State(app_state): State<AppState>,
    Path((tenant_id, feature_key)): Path<(Uuid, String)>,
) -> AppResult<impl IntoResponse> {
    let addon = app_state
        .entitlements
        .purchase_addon(tenant_id, &feature_key)
        .await?;
    Ok((StatusCode::CREATED, Json(addon)))
}

async fn cancel_addon(
    State(app_state): State<AppState>,
    Path(addon_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(app_state.entitlements.cancel_addon(addon_id).await?))
}
