use crate::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error before it gets converted into a status response.
        match &self {
            AppError::Database(_) | AppError::Internal(_) | AppError::SettlementProvider { .. } => {
                tracing::error!(error = %self, "Request failed")
            }
            _ => tracing::warn!(error = %self, "Request rejected"),
        }

        match self {
            AppError::Database(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseError, None)
            }
            AppError::InvalidInput(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidInput, Some(msg))
            }
            AppError::Validation(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::ValidationFailed, Some(msg))
            }
            AppError::Configuration(errors) => {
                let body = json!({
                    "code": ErrorCode::InvalidConfiguration.as_str(),
                    "message": errors.join("; "),
                    "errors": errors,
                });
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            AppError::NotConfigured(what) => error_resp(
                StatusCode::CONFLICT,
                ErrorCode::NotConfigured,
                Some(format!("Not configured: {what}")),
            ),
            AppError::EmptyBatch => error_resp(
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCode::EmptyBatch,
                Some(AppError::EmptyBatch.to_string()),
            ),
            AppError::TrialUnavailable(msg) => {
                error_resp(StatusCode::CONFLICT, ErrorCode::TrialUnavailable, Some(msg))
            }
            AppError::AddonUnavailable(msg) => {
                error_resp(StatusCode::CONFLICT, ErrorCode::AddonUnavailable, Some(msg))
            }
            AppError::InvalidSignature => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidSignature, None)
            }
            AppError::SettlementProvider { audit_id } => {
                let body = json!({
                    "code": ErrorCode::ProviderError.as_str(),
                    "message": "The settlement provider request failed",
                    "audit_id": audit_id,
                });
                (StatusCode::BAD_GATEWAY, Json(body)).into_response()
            }
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound, None),
            AppError::Internal(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError, None)
            }
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => json!({ "code": code.as_str(), "message": msg }),
        None => json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}
