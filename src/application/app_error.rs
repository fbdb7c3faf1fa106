use thiserror::Error;
use uuid::Uuid;

use crate::domain::iban::IbanError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Every problem found in a provider configuration, not just the first.
    #[error("Invalid provider configuration: {}", .0.join("; "))]
    Configuration(Vec<String>),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("No active mandates to include in the batch")]
    EmptyBatch,

    #[error("Trial unavailable: {0}")]
    TrialUnavailable(String),

    #[error("Add-on unavailable: {0}")]
    AddonUnavailable(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// The provider call failed; details live in the audit log entry.
    #[error("Settlement provider request failed (audit entry {audit_id})")]
    SettlementProvider { audit_id: Uuid },

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<IbanError> for AppError {
    fn from(err: IbanError) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    InvalidInput,
    ValidationFailed,
    InvalidConfiguration,
    NotConfigured,
    EmptyBatch,
    TrialUnavailable,
    AddonUnavailable,
    InvalidSignature,
    ProviderError,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::InvalidConfiguration => "INVALID_CONFIGURATION",
            ErrorCode::NotConfigured => "NOT_CONFIGURED",
            ErrorCode::EmptyBatch => "EMPTY_BATCH",
            ErrorCode::TrialUnavailable => "TRIAL_UNAVAILABLE",
            ErrorCode::AddonUnavailable => "ADDON_UNAVAILABLE",
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::ProviderError => "PROVIDER_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
