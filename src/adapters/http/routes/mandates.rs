use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    domain::iban::mask_iban,
    use_cases::manual_settlement::{BankDetailsInput, SepaMandateProfile},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/tenants/{tenant_id}/payers/{payer_id}/mandate",
            post(create_mandate).delete(revoke_mandate),
        )
        .route(
            "/tenants/{tenant_id}/payers/{payer_id}/mandate/document",
            get(get_mandate_document),
        )
}

/// Mandate as returned over HTTP, with the IBAN masked.
#[derive(Serialize)]
struct MandateResponse {
    id: Uuid,
    payer_id: Uuid,
    mandate_reference: String,
    iban: String,
    bic: Option<String>,
    bank_name: Option<String>,
    account_holder: String,
    creditor_id: String,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    revoked_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<SepaMandateProfile> for MandateResponse {
    fn from(m: SepaMandateProfile) -> Self {
        Self {
            id: m.id,
            payer_id: m.payer_id,
            mandate_reference: m.mandate_reference,
            iban: mask_iban(&m.iban),
            bic: m.bic,
            bank_name: m.bank_name,
            account_holder: m.payer_name,
            creditor_id: m.creditor_id,
            status: m.status.to_string(),
            created_at: m.created_at,
            revoked_at: m.revoked_at,
        }
    }
}

async fn create_mandate(
    State(app_state): State<AppState>,
    Path((tenant_id, payer_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<BankDetailsInput>,
) -> AppResult<impl IntoResponse> {
    let provider = app_state.registry.manual_provider(tenant_id).await;
    let mandate = provider.create_mandate(payer_id, payload).await?;
    Ok((StatusCode::CREATED, Json(MandateResponse::from(mandate))))
}

async fn revoke_mandate(
    State(app_state): State<AppState>,
    Path((tenant_id, payer_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let provider = app_state.registry.manual_provider(tenant_id).await;
    let mandate = provider.revoke_mandate(payer_id).await?;
    Ok(Json(MandateResponse::from(mandate)))
}

async fn get_mandate_document(
    State(app_state): State<AppState>,
    Path((tenant_id, payer_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let provider = app_state.registry.manual_provider(tenant_id).await;
    let document = provider.generate_mandate_document(payer_id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", document.file_name),
            ),
        ],
        document.content,
    ))
}
