use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::provider_kind::ProviderKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditAction {
    UpdateConfig,
    CreateMandate,
    RevokeMandate,
    CreatePaymentIntent,
    ExportLedger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub tenant_id: Uuid,
    pub payer_id: Option<Uuid>,
    pub provider: ProviderKind,
    pub action: AuditAction,
    pub status: AuditStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub payer_id: Option<Uuid>,
    pub provider: ProviderKind,
    pub action: String,
    pub status: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only log of provider interactions.
#[async_trait]
pub trait ProviderAuditLogRepo: Send + Sync {
    async fn append(&self, entry: &NewAuditEntry) -> AppResult<AuditLogEntry>;

    async fn list_recent(&self, tenant_id: Uuid, limit: i64) -> AppResult<Vec<AuditLogEntry>>;
}

/// Append an audit entry. Failing to audit never fails the action being audited.
pub async fn record_entry(repo: &dyn ProviderAuditLogRepo, entry: NewAuditEntry) {
    if let Err(e) = repo.append(&entry).await {
        tracing::warn!(
            tenant_id = %entry.tenant_id,
            action = %entry.action,
            error = %e,
            "Failed to append provider audit entry"
        );
    }
}

/// Record a failed provider call and turn it into the error callers see.
///
/// The original error text goes to the audit log verbatim; callers only get the entry id.
pub async fn capture_provider_failure(
    repo: &dyn ProviderAuditLogRepo,
    tenant_id: Uuid,
    payer_id: Option<Uuid>,
    provider: ProviderKind,
    action: AuditAction,
    error: &AppError,
) -> AppError {
    let entry = NewAuditEntry {
        tenant_id,
        payer_id,
        provider,
        action,
        status: AuditStatus::Failure,
        message: error.to_string(),
    };

    tracing::error!(
        tenant_id = %tenant_id,
        action = %action,
        error = %error,
        "Settlement provider call failed"
    );

    match repo.append(&entry).await {
        Ok(logged) => AppError::SettlementProvider { audit_id: logged.id },
        Err(audit_err) => {
            tracing::error!(
                tenant_id = %tenant_id,
                error = %audit_err,
                "Failed to record provider failure in audit log"
            );
            AppError::Internal("Settlement provider request failed".into())
        }
    }
}
