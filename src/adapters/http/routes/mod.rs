pub mod features;
pub mod gateway_webhooks;
pub mod iban;
pub mod jobs;
pub mod mandates;
pub mod payment_config;
pub mod payment_intents;
pub mod settlement;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(payment_config::router())
        .merge(mandates::router())
        .merge(settlement::router())
        .merge(payment_intents::router())
        .merge(features::router())
        .nest("/webhooks", gateway_webhooks::router())
        .nest("/jobs", jobs::router())
        .merge(iban::router())
}
