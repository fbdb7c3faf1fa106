use axum::{
    Json, Router,
    extract::Path,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    domain::iban::{self, BankLookup},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/iban/validate", post(validate_iban))
        .route("/iban/derive", post(derive_iban))
        .route("/banks/{bank_code}", get(lookup_bank))
}

#[derive(Deserialize)]
struct ValidatePayload {
    iban: String,
}

#[derive(Deserialize)]
struct DerivePayload {
    account_number: String,
    bank_code: String,
}

#[derive(Serialize)]
struct IbanResponse {
    iban: String,
    formatted: String,
    bank: BankLookup,
}

fn describe(valid: iban::GermanIban) -> IbanResponse {
    let bank = iban::bank_lookup(valid.bank_code());
    IbanResponse {
        formatted: valid.formatted(),
        iban: valid.into_string(),
        bank,
    }
}

async fn validate_iban(Json(payload): Json<ValidatePayload>) -> AppResult<impl IntoResponse> {
    let valid = iban::validate_german_iban(&payload.iban)?;
    Ok(Json(describe(valid)))
}

async fn derive_iban(Json(payload): Json<DerivePayload>) -> AppResult<impl IntoResponse> {
    let derived = iban::derive_iban(&payload.account_number, &payload.bank_code)?;
    Ok(Json(describe(derived)))
}

async fn lookup_bank(Path(bank_code): Path<String>) -> impl IntoResponse {
    Json(iban::bank_lookup(&bank_code))
}
