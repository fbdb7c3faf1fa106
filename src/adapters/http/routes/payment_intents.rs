use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    use_cases::{gateway_settlement::CreatePaymentIntentInput, provider_registry::ActiveProvider},
};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/tenants/{tenant_id}/payers/{payer_id}/payment-intents",
        post(create_payment_intent),
    )
}

async fn create_payment_intent(
    State(app_state): State<AppState>,
    Path((tenant_id, payer_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CreatePaymentIntentInput>,
) -> AppResult<impl IntoResponse> {
    let ActiveProvider::Gateway(gateway) = app_state.registry.get_provider(tenant_id).await else {
        return Err(AppError::NotConfigured(
            "payment gateway is not the active provider".into(),
        ));
    };

    let created = gateway.create_payment_intent(payer_id, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
