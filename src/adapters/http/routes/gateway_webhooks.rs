//! Inbound gateway webhooks.
//!
//! Processed, duplicate and ignored deliveries answer 200. Signature and payload problems
//! answer 400 so the gateway stops retrying; database failures answer 500 so it retries.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState, app_error::AppResult,
    infra::gateway_client::SIGNATURE_HEADER,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway/{tenant_id}", post(handle_gateway_webhook))
}

async fn handle_gateway_webhook(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    headers: HeaderMap,
    body: String,
) -> AppResult<impl IntoResponse> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let gateway = app_state.registry.gateway_for_webhooks(tenant_id).await?;
    let handling = gateway
        .handle_webhook(&body, signature, app_state.config.allow_unsigned_webhooks())
        .await?;

    Ok(Json(json!({ "received": true, "result": handling })))
}
