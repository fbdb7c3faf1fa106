use axum::{
    Json, Router,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use crate::{adapters::http::app_state::AppState, app_error::AppResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tenants/{tenant_id}/settlement/batch-file", get(get_batch_file))
        .route("/tenants/{tenant_id}/settlement/preview", get(get_preview))
        .route(
            "/tenants/{tenant_id}/settlement/missing-mandates",
            get(get_missing_mandates),
        )
}

async fn get_batch_file(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let provider = app_state.registry.manual_provider(tenant_id).await;
    let batch = provider.generate_batch_file().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", batch.file_name),
            ),
        ],
        batch.content,
    ))
}

async fn get_preview(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let provider = app_state.registry.manual_provider(tenant_id).await;
    Ok(Json(provider.preview_settlement_run().await?))
}

async fn get_missing_mandates(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let provider = app_state.registry.manual_provider(tenant_id).await;
    Ok(Json(provider.run_missing_mandate_diagnostic().await?))
}
