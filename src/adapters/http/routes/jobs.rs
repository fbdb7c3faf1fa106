//! Sweep endpoints for an external scheduler. Every sweep is safe to fire twice.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::post,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    adapters::http::app_state::AppState, app_error::AppResult,
    use_cases::ledger_export::DEFAULT_RETRY_BATCH_SIZE,
};

const MAX_RETRY_BATCH_SIZE: i64 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trials/expire", post(expire_trials))
        .route("/trials/reminders", post(trial_reminders))
        .route("/ledger-exports/retry", post(retry_ledger_exports))
}

#[derive(Deserialize)]
struct RetryParams {
    batch_size: Option<i64>,
}

async fn expire_trials(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let expired = app_state.entitlements.sweep_expired_trials().await?;
    Ok(Json(json!({ "expired": expired.len(), "trials": expired })))
}

async fn trial_reminders(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(app_state.entitlements.sweep_reminders().await?))
}

async fn retry_ledger_exports(
    State(app_state): State<AppState>,
    Query(params): Query<RetryParams>,
) -> AppResult<impl IntoResponse> {
    let batch_size = params
        .batch_size
        .unwrap_or(DEFAULT_RETRY_BATCH_SIZE)
        .clamp(1, MAX_RETRY_BATCH_SIZE);
    Ok(Json(
        app_state
            .ledger_exports
            .retry_due_exports(batch_size)
            .await?,
    ))
}
